/// Sound resource seam
///
/// The playback engine talks to audio output only through these traits.
/// [`super::player::RodioBackend`] is the production implementation.
use std::time::Duration;

use crate::error::PlaybackError;

/// Live status reported by a loaded resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStatus {
    pub is_playing: bool,
    pub is_buffering: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    /// True only on the first poll after playback reached the end
    pub did_just_finish: bool,
    pub is_looping: bool,
    /// Set when the resource failed after it was created
    pub error: Option<String>,
}

/// One loaded sound
pub trait SoundResource: Send {
    fn uri(&self) -> &str;

    /// Start or resume playback; restarts from the beginning after a stop or finish
    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Halt playback and rewind, keeping the resource loaded
    fn stop(&mut self) -> Result<(), PlaybackError>;

    fn set_looping(&mut self, enabled: bool) -> Result<(), PlaybackError>;

    /// Sample the live status
    fn poll(&mut self) -> ResourceStatus;

    /// Release the underlying output. The resource is unusable afterwards.
    fn unload(&mut self);
}

/// Factory for sound resources
pub trait SoundBackend: Send + Sync {
    /// Create a resource for `uri`. May block on network or disk I/O.
    fn load(&self, uri: &str) -> Result<Box<dyn SoundResource>, PlaybackError>;
}
