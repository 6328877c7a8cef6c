/// Queue navigation
///
/// Ordered track list with an active index, shuffle and repeat. Forward
/// navigation honors shuffle; backward navigation is always sequential.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio_system::PlaybackStatus;
use crate::feed::Track;

pub struct QueueNavigator {
    tracks: Vec<Track>,
    active_index: usize,
    shuffle: bool,
    repeat: bool,
    rng: StdRng,
    /// URI the engine currently reports
    active_uri: Option<String>,
    /// URI that already triggered an auto-advance
    last_finished_uri: Option<String>,
}

impl Default for QueueNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueNavigator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffle order
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            active_index: 0,
            shuffle: false,
            repeat: false,
            rng,
            active_uri: None,
            last_finished_uri: None,
        }
    }

    /// Replace the list in feed order and select the first track
    pub fn load(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.active_index = 0;
        self.last_finished_uri = None;
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// `None` when the queue is empty
    pub fn active_index(&self) -> Option<usize> {
        (!self.tracks.is_empty()).then_some(self.active_index)
    }

    pub fn active_track(&self) -> Option<&Track> {
        self.tracks.get(self.active_index)
    }

    /// Make `index` active. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            return None;
        }
        self.active_index = index;
        self.tracks.get(index)
    }

    /// Index `next()` would move to
    pub fn next_index(&mut self) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        if !self.shuffle {
            return Some((self.active_index + 1) % len);
        }
        if len == 1 {
            return Some(self.active_index);
        }
        loop {
            let candidate = self.rng.gen_range(0..len);
            if candidate != self.active_index {
                return Some(candidate);
            }
        }
    }

    pub fn prev_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        (len > 0).then(|| (self.active_index + len - 1) % len)
    }

    /// The sequential successor, warmed ahead of need
    pub fn upcoming_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        (len > 0).then(|| (self.active_index + 1) % len)
    }

    pub fn next(&mut self) -> Option<usize> {
        let index = self.next_index()?;
        self.active_index = index;
        Some(index)
    }

    pub fn prev(&mut self) -> Option<usize> {
        let index = self.prev_index()?;
        self.active_index = index;
        Some(index)
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        self.repeat
    }

    /// Track the engine's current URI; a change clears the finish marker
    pub fn set_active_uri(&mut self, uri: Option<&str>) {
        if self.active_uri.as_deref() != uri {
            self.active_uri = uri.map(str::to_string);
            self.last_finished_uri = None;
        }
    }

    /// Whether `status` should advance the queue.
    ///
    /// Returns `true` at most once per finished URI until the engine moves
    /// to another URI.
    pub fn observe_finish(&mut self, status: &PlaybackStatus, music_paused: bool) -> bool {
        self.set_active_uri(status.uri.as_deref());
        if !status.did_just_finish || self.repeat || music_paused {
            return false;
        }
        let Some(uri) = status.uri.as_deref() else {
            return false;
        };
        if self.last_finished_uri.as_deref() == Some(uri) {
            tracing::debug!("Ignoring repeated finish for {}", uri);
            return false;
        }
        self.last_finished_uri = Some(uri.to_string());
        true
    }
}
