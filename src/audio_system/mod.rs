/// Audio system module
///
/// Owns the single loaded sound resource and reports its status.
///
/// ## Architecture
///
/// ```text
/// PlaybackEngine ──load(uri)──> SoundBackend (RodioBackend)
///   │                               ├── SoundResource (one at a time)
///   │                               └── SharedStream (progressive HTTP download)
///   ├── pending guard (single in-flight play transition)
///   └── StatusPublisher ──latest value──> StatusReceiver(s)
///            ▲
///   StatusMonitor (ticker thread, polls the resource)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let engine = Arc::new(PlaybackEngine::new(Arc::new(RodioBackend::new()?), bus));
/// let _monitor = StatusMonitor::start(&engine, Duration::from_millis(500))?;
///
/// engine.play("https://cdn.example.org/hymn.mp3")?; // Loading -> Playing
/// engine.play("https://cdn.example.org/hymn.mp3")?; // Playing -> Paused
///
/// let mut status = engine.subscribe();
/// if let Some(s) = status.recv_timeout(Duration::from_secs(1)) {
///     println!("{} / {}", s.position_millis, s.duration_millis);
/// }
/// ```
pub mod backend;
pub mod engine;
mod media_info;
pub mod monitor;
pub mod player;
pub mod state;
pub mod status;
mod stream;

// Re-export commonly used types
pub use backend::{ResourceStatus, SoundBackend, SoundResource};
pub use engine::PlaybackEngine;
pub use monitor::StatusMonitor;
pub use player::RodioBackend;
pub use state::{PlayTransition, PlaybackState};
pub use status::{status_channel, PlaybackStatus, StatusError, StatusPublisher, StatusReceiver};
