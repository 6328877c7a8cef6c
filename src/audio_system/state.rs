/// Playback engine state machine
///
/// ```text
/// Idle ──play──> Loading ──ok──> Playing <──toggle──> Paused
///                   │               │                   │
///                   │             stop/finish ─────> Stopped (still loaded)
///                   └──err──> Error <── mid-stream failure
/// ```
///
/// `play()` of a different URI from any state goes back through `Loading`.

/// State of the playback engine
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlaybackState {
    /// Nothing has been loaded
    #[default]
    Idle,

    /// A resource is being created (transitional state)
    Loading,

    /// The loaded resource is playing
    Playing,

    /// The loaded resource is paused
    Paused,

    /// The resource is loaded but halted
    Stopped,

    /// Loading failed or the resource failed mid-stream
    Error,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    /// Whether a resource is installed and usable
    pub fn is_loaded(&self) -> bool {
        matches!(
            self,
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Stopped
        )
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Loading => "Loading...",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Error => "Error",
        }
    }
}

/// Outcome of a `play()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTransition {
    /// A new resource was loaded and started
    Loaded,

    /// The current resource resumed
    Resumed,

    /// The current resource paused
    Paused,

    /// Another transition was pending; the call was dropped
    Busy,

    /// Empty URI, or the current resource has no live status
    Ignored,

    /// The load was overtaken by a newer `play()` and discarded
    Superseded,
}
