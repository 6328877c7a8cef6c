//! Chapel Audio
//!
//! Media playback and cache coordination for a small congregation app:
//! link resolution, a content-addressed audio cache with background
//! prefetch, a single-resource playback engine, queue navigation, a
//! meeting schedule gate and a download exporter.

pub mod audio_system;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod exporter;
pub mod feed;
pub mod http;
pub mod link_resolver;
pub mod messaging;
pub mod music_player;
pub mod queue;
pub mod schedule;
pub mod sermons;
pub mod slug;
pub mod utils;

#[cfg(test)]
mod testing;

pub use audio_system::{
    PlayTransition, PlaybackEngine, PlaybackState, PlaybackStatus, RodioBackend, SoundBackend,
    SoundResource,
};
pub use cache::{CacheStore, PrefetchScheduler};
pub use config::Config;
pub use context::AppContext;
pub use error::{AppResult, PlaybackError};
pub use exporter::{DownloadExporter, ExportStatus, ShareTarget, SystemShare};
pub use feed::Track;
pub use http::{HttpClient, UreqClient};
pub use link_resolver::{resolve, ResolvedLink};
pub use music_player::{MusicPlayer, PlayOutcome, PlayerView};
pub use queue::QueueNavigator;
pub use schedule::{MeetingSchedule, MeetingWindow, ScheduleGate};
pub use sermons::SermonPlayer;
