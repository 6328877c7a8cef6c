/// Download exporter
///
/// Saves a track under a readable name in a durable directory (separate
/// from the content-addressed cache) and hands the file to a share action.
/// Each call reports `Downloading` then `Saved` or `Failed` on its own
/// channel. There is no retry; the user triggers again.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::cache::infer_extension;
use crate::error::{ExportError, HttpError};
use crate::feed::Track;
use crate::http::HttpClient;
use crate::link_resolver::{self, ResolvedLink, INVALID_LINK_MESSAGE};
use crate::messaging::{Event, EventBus};
use crate::slug::filename_stem;

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Progress of one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    /// The link was rejected; nothing was downloaded
    InvalidLink,
    Downloading { path: PathBuf },
    Saved { path: PathBuf },
    Failed { message: String },
}

impl ExportStatus {
    /// Message shown next to the track
    pub fn message(&self) -> &str {
        match self {
            ExportStatus::InvalidLink => INVALID_LINK_MESSAGE,
            ExportStatus::Downloading { .. } => "Downloading...",
            ExportStatus::Saved { .. } => "Saved. Choose where to keep it.",
            ExportStatus::Failed { .. } => "Download failed. Try again.",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportStatus::Downloading { .. })
    }
}

/// External share/export action for a saved file
pub trait ShareTarget: Send + Sync {
    fn share(&self, path: &Path, message: &str) -> Result<(), ExportError>;
}

/// Opens the saved file with the OS default handler
pub struct SystemShare;

impl ShareTarget for SystemShare {
    fn share(&self, path: &Path, message: &str) -> Result<(), ExportError> {
        tracing::info!("{} {}", message, path.display());
        open::that(path).map_err(|e| ExportError::ShareFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

pub struct DownloadExporter {
    root: PathBuf,
    http: Arc<dyn HttpClient>,
    share: Arc<dyn ShareTarget>,
    share_message: String,
    event_bus: EventBus,
}

impl DownloadExporter {
    pub fn new(
        root: impl Into<PathBuf>,
        http: Arc<dyn HttpClient>,
        share: Arc<dyn ShareTarget>,
        share_message: impl Into<String>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            root: root.into(),
            http,
            share,
            share_message: share_message.into(),
            event_bus,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<sanitized-title>.<ext>`, or `None` for a rejected link
    pub fn target_path(&self, track: &Track) -> Option<PathBuf> {
        let resolved = link_resolver::resolve(&track.audio_url).into_playable()?;
        Some(self.path_for(track, &resolved))
    }

    fn path_for(&self, track: &Track, resolved: &str) -> PathBuf {
        self.root.join(format!(
            "{}.{}",
            filename_stem(&track.title),
            infer_extension(resolved)
        ))
    }

    /// Start exporting `track` on a worker thread.
    ///
    /// The returned receiver yields every status for this export and
    /// disconnects after the terminal one.
    pub fn download(&self, track: &Track) -> Receiver<ExportStatus> {
        let (tx, rx) = unbounded();
        let key = track_key(track);

        let resolved = match link_resolver::resolve(&track.audio_url) {
            ResolvedLink::Playable(url) => url,
            ResolvedLink::Rejected(reason) => {
                tracing::warn!("Not exporting {}: {}", key, reason);
                self.report(&tx, &key, ExportStatus::InvalidLink);
                return rx;
            }
        };

        let job = ExportJob {
            key: key.clone(),
            url: resolved.clone(),
            target: self.path_for(track, &resolved),
            http: Arc::clone(&self.http),
            share: Arc::clone(&self.share),
            share_message: self.share_message.clone(),
            event_bus: self.event_bus.clone(),
            tx: tx.clone(),
        };

        if let Err(e) = thread::Builder::new()
            .name("export".to_string())
            .spawn(move || job.run())
        {
            self.report(
                &tx,
                &key,
                ExportStatus::Failed {
                    message: e.to_string(),
                },
            );
        }
        rx
    }

    fn report(&self, tx: &Sender<ExportStatus>, key: &str, status: ExportStatus) {
        report(&self.event_bus, tx, key, status);
    }
}

fn track_key(track: &Track) -> String {
    if !track.id.is_empty() {
        track.id.clone()
    } else {
        track.title.clone()
    }
}

fn report(event_bus: &EventBus, tx: &Sender<ExportStatus>, key: &str, status: ExportStatus) {
    event_bus.publish(Event::ExportStatusChanged {
        track_id: key.to_string(),
        status: status.clone(),
    });
    let _ = tx.send(status);
}

struct ExportJob {
    key: String,
    url: String,
    target: PathBuf,
    http: Arc<dyn HttpClient>,
    share: Arc<dyn ShareTarget>,
    share_message: String,
    event_bus: EventBus,
    tx: Sender<ExportStatus>,
}

impl ExportJob {
    fn run(self) {
        report(
            &self.event_bus,
            &self.tx,
            &self.key,
            ExportStatus::Downloading {
                path: self.target.clone(),
            },
        );

        match self.save() {
            Ok(()) => {
                tracing::info!("Saved {} to {}", self.url, self.target.display());
                report(
                    &self.event_bus,
                    &self.tx,
                    &self.key,
                    ExportStatus::Saved {
                        path: self.target.clone(),
                    },
                );
                if let Err(e) = self.share.share(&self.target, &self.share_message) {
                    tracing::warn!("Share failed: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Export of {} failed: {}", self.url, e);
                report(
                    &self.event_bus,
                    &self.tx,
                    &self.key,
                    ExportStatus::Failed {
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    fn save(&self) -> Result<(), ExportError> {
        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent).map_err(|source| ExportError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let part = self.target.with_extension(format!(
            "{}-{}.part",
            std::process::id(),
            PART_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let result = self
            .http
            .download_to(&self.url, &part)
            .and_then(|_| {
                fs::rename(&part, &self.target).map_err(|source| HttpError::Io {
                    path: self.target.display().to_string(),
                    source,
                })
            })
            .map_err(ExportError::DownloadFailed);

        if result.is_err() {
            let _ = fs::remove_file(&part);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHttp;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingShare {
        shared: Mutex<Vec<(PathBuf, String)>>,
    }

    impl ShareTarget for RecordingShare {
        fn share(&self, path: &Path, message: &str) -> Result<(), ExportError> {
            self.shared
                .lock()
                .push((path.to_path_buf(), message.to_string()));
            Ok(())
        }
    }

    fn exporter(root: &Path, http: Arc<FakeHttp>, share: Arc<RecordingShare>) -> DownloadExporter {
        DownloadExporter::new(root, http, share, "Sermon downloaded.", EventBus::new())
    }

    fn sermon(title: &str, url: &str) -> Track {
        Track {
            id: "s1".to_string(),
            title: title.to_string(),
            audio_url: url.to_string(),
            ..Track::default()
        }
    }

    #[test]
    fn test_saves_and_shares() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new());
        let share = Arc::new(RecordingShare::default());
        let url = "https://cdn.example.org/sermons/faith.m4a";
        http.insert(url, b"sermon".to_vec());

        let exporter = exporter(dir.path(), http, share.clone());
        let statuses: Vec<_> = exporter
            .download(&sermon("Faith & Works: Part 1", url))
            .iter()
            .collect();

        let expected = dir.path().join("Faith_Works_Part_1.m4a");
        assert_eq!(
            statuses,
            vec![
                ExportStatus::Downloading {
                    path: expected.clone()
                },
                ExportStatus::Saved {
                    path: expected.clone()
                },
            ]
        );
        assert_eq!(fs::read(&expected).unwrap(), b"sermon");
        assert_eq!(
            share.shared.lock().clone(),
            vec![(expected, "Sermon downloaded.".to_string())]
        );
    }

    #[test]
    fn test_rejected_link_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new());
        let exporter = exporter(dir.path(), http.clone(), Arc::new(RecordingShare::default()));

        let track = sermon("Folder", "https://drive.google.com/drive/folders/abc");
        let statuses: Vec<_> = exporter.download(&track).iter().collect();

        assert_eq!(statuses, vec![ExportStatus::InvalidLink]);
        assert_eq!(http.total_downloads(), 0);
        assert!(exporter.target_path(&track).is_none());
    }

    #[test]
    fn test_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new());
        let share = Arc::new(RecordingShare::default());
        let url = "https://cdn.example.org/missing.mp3";
        http.fail(url, 404);

        let exporter = exporter(dir.path(), http, share.clone());
        let statuses: Vec<_> = exporter.download(&sermon("Missing", url)).iter().collect();

        assert!(matches!(statuses.last(), Some(ExportStatus::Failed { .. })));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(share.shared.lock().is_empty());
    }

    #[test]
    fn test_drive_link_uses_resolved_url() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new());
        http.insert(
            "https://drive.google.com/uc?export=download&id=XYZ",
            b"drive".to_vec(),
        );
        let exporter = exporter(dir.path(), http, Arc::new(RecordingShare::default()));

        let track = sermon("", "https://drive.google.com/file/d/XYZ/view?usp=sharing");
        assert_eq!(
            exporter.target_path(&track),
            Some(dir.path().join("audio.mp3"))
        );
        let last = exporter.download(&track).iter().last();
        assert!(matches!(last, Some(ExportStatus::Saved { .. })));
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(
            ExportStatus::InvalidLink.message(),
            "Invalid audio link. Use a file link, not a folder."
        );
        assert!(!ExportStatus::Downloading {
            path: PathBuf::new()
        }
        .is_terminal());
    }
}
