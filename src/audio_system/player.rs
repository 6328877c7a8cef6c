/// Rodio-backed sound resources
///
/// The output stream is not `Send`, so it lives on its own thread for the
/// lifetime of the backend. Resources only hold the cloneable stream handle.
/// Remote audio streams progressively; local files are read into memory.
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::backend::{ResourceStatus, SoundBackend, SoundResource};
use super::media_info::media_duration;
use super::stream::{Downloader, HttpDownload, SharedStream};
use crate::cache::infer_extension;
use crate::error::PlaybackError;

/// Audio bytes shared between the resource and each decoder pass
#[derive(Clone)]
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

fn local_path(uri: &str) -> &Path {
    Path::new(uri.strip_prefix("file://").unwrap_or(uri))
}

fn read_local(uri: &str) -> Result<Vec<u8>, PlaybackError> {
    fs::read(local_path(uri)).map_err(|e| PlaybackError::LoadFailed {
        uri: uri.to_string(),
        message: e.to_string(),
    })
}

fn decode<R>(uri: &str, reader: R) -> Result<Decoder<R>, PlaybackError>
where
    R: Read + Seek + Send + Sync + 'static,
{
    Decoder::new(reader).map_err(|e| PlaybackError::DecodeFailed {
        uri: uri.to_string(),
        message: e.to_string(),
    })
}

/// Where a resource's decoders read from
enum AudioData {
    Local(SharedBytes),
    Remote(SharedStream<HttpDownload>),
}

impl AudioData {
    fn append_to(&self, uri: &str, sink: &Sink) -> Result<(), PlaybackError> {
        match self {
            AudioData::Local(bytes) => sink.append(decode(uri, Cursor::new(bytes.clone()))?),
            AudioData::Remote(stream) => sink.append(decode(uri, stream.rewound())?),
        }
        Ok(())
    }

    fn is_waiting(&self) -> bool {
        match self {
            AudioData::Local(_) => false,
            AudioData::Remote(stream) => stream.is_waiting(),
        }
    }
}

/// [`SoundBackend`] on the default rodio output device
pub struct RodioBackend {
    handle: OutputStreamHandle,
    downloader: Downloader,
    shutdown: Option<Sender<()>>,
    output_thread: Option<JoinHandle<()>>,
}

impl RodioBackend {
    pub fn new() -> Result<Self, PlaybackError> {
        let downloader = Downloader::new()?;
        let (handle_tx, handle_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let output_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if handle_tx.send(Ok(handle)).is_ok() {
                        // Keep the stream alive until the backend goes away.
                        let _ = shutdown_rx.recv();
                    }
                    drop(stream);
                    tracing::debug!("Audio output stream closed");
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| PlaybackError::StreamInitFailed(e.to_string()))?;

        let handle = handle_rx
            .recv()
            .map_err(|e| PlaybackError::StreamInitFailed(e.to_string()))?
            .map_err(PlaybackError::StreamInitFailed)?;

        tracing::info!("Audio output stream initialized");
        Ok(Self {
            handle,
            downloader,
            shutdown: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

impl SoundBackend for RodioBackend {
    fn load(&self, uri: &str) -> Result<Box<dyn SoundResource>, PlaybackError> {
        let extension = infer_extension(uri);
        let (data, duration) = if is_remote(uri) {
            let stream = self.downloader.open(uri)?;
            // Only header metadata; counting packets would wait for the whole download.
            let duration = media_duration(Box::new(stream.rewound()), Some(&extension), false);
            (AudioData::Remote(stream), duration)
        } else {
            let bytes = SharedBytes(Arc::new(read_local(uri)?));
            let duration =
                media_duration(Box::new(Cursor::new(bytes.clone())), Some(&extension), true);
            (AudioData::Local(bytes), duration)
        };
        let sink = new_sink(&self.handle)?;
        // Fail now rather than on the first play().
        data.append_to(uri, &sink)?;

        tracing::debug!("Loaded {} (duration {:?})", uri, duration);
        Ok(Box::new(RodioSound {
            uri: uri.to_string(),
            data,
            handle: self.handle.clone(),
            sink,
            duration,
            looping: false,
            active: false,
        }))
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(handle) = self.output_thread.take() {
            let _ = handle.join();
        }
    }
}

fn new_sink(handle: &OutputStreamHandle) -> Result<Sink, PlaybackError> {
    let sink = Sink::try_new(handle).map_err(|e| PlaybackError::PlaybackFailed(e.to_string()))?;
    sink.pause();
    Ok(sink)
}

/// One decoded track queued on its own sink
struct RodioSound {
    uri: String,
    data: AudioData,
    handle: OutputStreamHandle,
    sink: Sink,
    duration: Option<Duration>,
    looping: bool,
    /// Started and not yet finished or stopped
    active: bool,
}

impl RodioSound {
    fn enqueue(&self) -> Result<(), PlaybackError> {
        self.data.append_to(&self.uri, &self.sink)
    }
}

impl SoundResource for RodioSound {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.sink.empty() {
            self.enqueue()?;
        }
        self.sink.play();
        self.active = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.sink.pause();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.sink.stop();
        // A stopped sink cannot be reused reliably; start over on a fresh one.
        self.sink = new_sink(&self.handle)?;
        self.active = false;
        Ok(())
    }

    fn set_looping(&mut self, enabled: bool) -> Result<(), PlaybackError> {
        self.looping = enabled;
        Ok(())
    }

    fn poll(&mut self) -> ResourceStatus {
        let mut did_just_finish = false;
        let mut error = None;

        if self.active && self.sink.empty() {
            if self.looping {
                match self.enqueue() {
                    Ok(()) => self.sink.play(),
                    Err(e) => {
                        self.active = false;
                        error = Some(e.to_string());
                    }
                }
            } else {
                self.active = false;
                did_just_finish = true;
            }
        }

        let is_playing = self.active && !self.sink.is_paused();
        ResourceStatus {
            is_playing,
            is_buffering: is_playing && self.data.is_waiting(),
            position: self.sink.get_pos(),
            duration: self.duration,
            did_just_finish,
            is_looping: self.looping,
            error,
        }
    }

    fn unload(&mut self) {
        self.sink.stop();
        self.active = false;
    }
}
