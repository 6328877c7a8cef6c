/// Progressive HTTP sources
///
/// Remote audio is fetched by `stream-download` into temporary storage while
/// rodio decodes from whatever has already arrived. Every decoder pass gets
/// its own reader position over the one shared download, so looping and
/// replaying never fetch the file twice.
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use stream_download::storage::temp::TempStorageProvider;
use stream_download::{Settings, StreamDownload};
use symphonia::core::io::MediaSource;
use tokio::runtime::Runtime;

use crate::error::PlaybackError;

pub type HttpDownload = StreamDownload<TempStorageProvider>;

/// Owns the runtime the background downloads run on
pub struct Downloader {
    runtime: Runtime,
}

impl Downloader {
    pub fn new() -> Result<Self, PlaybackError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("audio-download")
            .enable_all()
            .build()
            .map_err(|e| PlaybackError::StreamInitFailed(e.to_string()))?;
        Ok(Self { runtime })
    }

    /// Start downloading `uri`. Returns once the response has started; the
    /// body keeps arriving in the background.
    pub fn open(&self, uri: &str) -> Result<SharedStream<HttpDownload>, PlaybackError> {
        let url = url::Url::parse(uri).map_err(|e| load_failed(uri, e))?;
        let download = self
            .runtime
            .block_on(StreamDownload::new_http(
                url,
                TempStorageProvider::default(),
                Settings::default(),
            ))
            .map_err(|e| load_failed(uri, e))?;
        tracing::debug!("Streaming {}", uri);
        Ok(SharedStream::new(download))
    }
}

fn load_failed(uri: &str, error: impl std::fmt::Display) -> PlaybackError {
    PlaybackError::LoadFailed {
        uri: uri.to_string(),
        message: error.to_string(),
    }
}

/// Independent cursor over a shared seekable source.
///
/// A read blocked on data that has not arrived yet marks the stream as
/// waiting, which is what the resource reports as buffering.
pub struct SharedStream<R> {
    inner: Arc<Mutex<R>>,
    waiting: Arc<AtomicBool>,
    position: u64,
}

impl<R> SharedStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
            waiting: Arc::new(AtomicBool::new(false)),
            position: 0,
        }
    }

    /// A new cursor at the start of the same source
    pub fn rewound(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            waiting: Arc::clone(&self.waiting),
            position: 0,
        }
    }

    /// Whether some cursor is currently blocked reading the source
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::Acquire)
    }
}

impl<R: Read + Seek> Read for SharedStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        self.waiting.store(true, Ordering::Release);
        let result = inner
            .seek(SeekFrom::Start(self.position))
            .and_then(|_| inner.read(buf));
        self.waiting.store(false, Ordering::Release);

        let read = result?;
        self.position += read as u64;
        Ok(read)
    }
}

impl<R: Read + Seek> Seek for SharedStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
            })?,
            // Only the source knows where it ends.
            SeekFrom::End(_) => self.inner.lock().seek(pos)?,
        };
        Ok(self.position)
    }
}

impl<R: Read + Seek + Send> MediaSource for SharedStream<R> {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}
