/// Event types for the application
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use std::path::PathBuf;

use crate::audio_system::PlaybackState;
use crate::exporter::ExportStatus;

/// Application events
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The active queue index changed
    TrackSelected { index: usize, title: String },

    /// A track's link cannot be played; nothing reached the engine
    LinkRejected { title: String, message: String },

    /// Engine state after an engine-level update
    PlaybackStateChanged {
        uri: Option<String>,
        state: PlaybackState,
    },

    /// A resource failed to load or failed mid-stream
    PlaybackFailed { uri: String, message: String },

    /// The queue moved on after a track finished unassisted
    AutoAdvanced { from: usize, to: usize },

    /// A prefetch landed in the cache
    PrefetchCompleted { url: String, path: PathBuf },

    /// A prefetch failed; playback is unaffected
    PrefetchFailed { url: String, message: String },

    /// The schedule gate started or stopped pausing music
    MusicPauseChanged { paused: bool },

    /// Progress of a user-triggered download
    ExportStatusChanged {
        track_id: String,
        status: ExportStatus,
    },

    /// Application is shutting down
    Shutdown,
}

impl Event {
    /// Short label used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::TrackSelected { .. } => "track-selected",
            Event::LinkRejected { .. } => "link-rejected",
            Event::PlaybackStateChanged { .. } => "playback-state",
            Event::PlaybackFailed { .. } => "playback-failed",
            Event::AutoAdvanced { .. } => "auto-advanced",
            Event::PrefetchCompleted { .. } => "prefetch-completed",
            Event::PrefetchFailed { .. } => "prefetch-failed",
            Event::MusicPauseChanged { .. } => "music-pause",
            Event::ExportStatusChanged { .. } => "export-status",
            Event::Shutdown => "shutdown",
        }
    }
}
