/// Music player coordinator
///
/// Ties the queue, link resolution, cache and schedule gate to the single
/// playback engine:
///
/// ```text
/// select(index) ─> resolve(link) ─┬─ rejected ─> link error, no playback
///                                 └─ url ─> cached path? ─> engine.play(path | url)
///                                              └─ none ─> stream url, warm cache
/// engine status ─> observe_finish ─> next()
/// schedule window ─> music pause ─> engine.stop()
/// ```
///
/// The queue lock is never held across an engine call.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio_system::{PlayTransition, PlaybackEngine, PlaybackStatus};
use crate::cache::PrefetchScheduler;
use crate::error::PlaybackError;
use crate::feed::Track;
use crate::link_resolver::{self, ResolvedLink, INVALID_LINK_MESSAGE};
use crate::messaging::{Event, EventBus};
use crate::queue::QueueNavigator;
use crate::schedule::MeetingWindow;
use crate::utils::progress_ratio;

/// Rejected link for the track at `key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub key: String,
    pub message: String,
}

/// What a play request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The request reached the engine
    Engine(PlayTransition),
    /// Selected, but the schedule is pausing music
    MusicPaused,
    /// Selected, but its link cannot be played
    LinkRejected,
    /// No track at that index
    NoTrack,
}

/// Everything a screen needs to render the player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub hero: Option<Track>,
    pub active_index: Option<usize>,
    pub track_count: usize,
    /// The engine holds the hero track
    pub hero_active: bool,
    pub is_playing: bool,
    pub position_millis: u64,
    pub duration_millis: u64,
    pub progress: f64,
    pub link_error: Option<LinkError>,
    pub shuffle: bool,
    pub repeat: bool,
    pub music_paused: bool,
    pub playback_error: Option<String>,
}

pub struct MusicPlayer {
    queue: Mutex<QueueNavigator>,
    engine: Arc<PlaybackEngine>,
    prefetch: PrefetchScheduler,
    music_paused: AtomicBool,
    link_error: Mutex<Option<LinkError>>,
    prefetch_count: usize,
    event_bus: EventBus,
}

impl MusicPlayer {
    pub fn new(engine: Arc<PlaybackEngine>, prefetch: PrefetchScheduler, event_bus: EventBus) -> Self {
        Self {
            queue: Mutex::new(QueueNavigator::new()),
            engine,
            prefetch,
            music_paused: AtomicBool::new(false),
            link_error: Mutex::new(None),
            prefetch_count: 3,
            event_bus,
        }
    }

    /// Number of tracks warmed when a list is loaded
    pub fn with_prefetch_count(mut self, count: usize) -> Self {
        self.prefetch_count = count;
        self
    }

    pub fn with_queue(mut self, queue: QueueNavigator) -> Self {
        self.queue = Mutex::new(queue);
        self
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    /// Replace the queue and warm the first resolvable tracks
    pub fn load_tracks(&self, tracks: Vec<Track>) {
        let (initial, upcoming) = {
            let mut queue = self.queue.lock();
            queue.load(tracks);
            let initial: Vec<String> = queue
                .tracks()
                .iter()
                .filter_map(|t| link_resolver::resolve(&t.audio_url).into_playable())
                .take(self.prefetch_count)
                .collect();
            let upcoming = queue
                .upcoming_index()
                .and_then(|i| queue.track(i).cloned());
            (initial, upcoming)
        };
        *self.link_error.lock() = None;

        tracing::debug!("Warming {} track(s)", initial.len());
        for url in initial {
            self.prefetch.warm(&url);
        }
        self.warm_track(upcoming.as_ref());
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.queue.lock().tracks().to_vec()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.queue.lock().active_index()
    }

    /// Select the track at `index` and play it.
    ///
    /// Selection always happens; playback is skipped while music is paused
    /// or when the link is rejected.
    pub fn play_track(&self, index: usize) -> Result<PlayOutcome, PlaybackError> {
        let (track, upcoming) = {
            let mut queue = self.queue.lock();
            let Some(track) = queue.select(index).cloned() else {
                return Ok(PlayOutcome::NoTrack);
            };
            let upcoming = queue
                .upcoming_index()
                .and_then(|i| queue.track(i).cloned());
            (track, upcoming)
        };

        self.event_bus.publish(Event::TrackSelected {
            index,
            title: track.title.clone(),
        });
        self.warm_track(upcoming.as_ref());

        if self.music_paused() {
            tracing::debug!("Music paused; not playing {}", track.title);
            return Ok(PlayOutcome::MusicPaused);
        }

        let url = match link_resolver::resolve(&track.audio_url) {
            ResolvedLink::Playable(url) => url,
            ResolvedLink::Rejected(reason) => {
                tracing::warn!("Rejected link for {}: {}", track.title, reason);
                *self.link_error.lock() = Some(LinkError {
                    key: track.display_key(index),
                    message: INVALID_LINK_MESSAGE.to_string(),
                });
                self.event_bus.publish(Event::LinkRejected {
                    title: track.title.clone(),
                    message: INVALID_LINK_MESSAGE.to_string(),
                });
                return Ok(PlayOutcome::LinkRejected);
            }
        };
        *self.link_error.lock() = None;

        let uri = self.playback_uri(&url);
        let transition = self.engine.play(&uri)?;
        let repeat = self.queue.lock().repeat();
        self.engine.set_looping(repeat);
        Ok(PlayOutcome::Engine(transition))
    }

    /// The URI to hand the engine for `url`: whatever is already loaded for
    /// it, else a cached copy, else the URL itself (warming the cache).
    fn playback_uri(&self, url: &str) -> String {
        let cached = self.cached_uri(url);
        if let Some(current) = self.engine.current_uri() {
            if current == url || Some(&current) == cached.as_ref() {
                return current;
            }
        }
        match cached {
            Some(path) => path,
            None => {
                self.prefetch.warm(url);
                url.to_string()
            }
        }
    }

    fn cached_uri(&self, url: &str) -> Option<String> {
        self.prefetch
            .local_copy(url)
            .map(|path| path.to_string_lossy().into_owned())
    }

    fn warm_track(&self, track: Option<&Track>) {
        if let Some(url) = track.and_then(|t| link_resolver::resolve(&t.audio_url).into_playable())
        {
            self.prefetch.warm(&url);
        }
    }

    /// Play/pause the active track
    pub fn toggle_play(&self) -> Result<PlayOutcome, PlaybackError> {
        let active = {
            let queue = self.queue.lock();
            queue
                .active_track()
                .filter(|t| !t.audio_url.is_empty())
                .and(queue.active_index())
        };
        let Some(index) = active else {
            return Ok(PlayOutcome::NoTrack);
        };
        if self.music_paused() {
            return Ok(PlayOutcome::MusicPaused);
        }
        self.play_track(index)
    }

    pub fn next(&self) -> Result<PlayOutcome, PlaybackError> {
        let next = self.queue.lock().next_index();
        match next {
            Some(index) => self.play_track(index),
            None => Ok(PlayOutcome::NoTrack),
        }
    }

    pub fn prev(&self) -> Result<PlayOutcome, PlaybackError> {
        let prev = self.queue.lock().prev_index();
        match prev {
            Some(index) => self.play_track(index),
            None => Ok(PlayOutcome::NoTrack),
        }
    }

    pub fn stop(&self) -> Result<(), PlaybackError> {
        self.engine.stop()
    }

    pub fn toggle_shuffle(&self) -> bool {
        let shuffle = self.queue.lock().toggle_shuffle();
        tracing::debug!("Shuffle {}", if shuffle { "on" } else { "off" });
        shuffle
    }

    /// Toggle repeat and apply it to the loaded resource right away
    pub fn toggle_repeat(&self) -> bool {
        let repeat = self.queue.lock().toggle_repeat();
        self.engine.set_looping(repeat);
        tracing::debug!("Repeat {}", if repeat { "on" } else { "off" });
        repeat
    }

    /// Feed an engine status to the queue; advances on a genuine finish.
    ///
    /// Returns the index advanced to.
    pub fn handle_status(&self, status: &PlaybackStatus) -> Option<usize> {
        let (active, from, to) = {
            let mut queue = self.queue.lock();
            if !queue.observe_finish(status, self.music_paused()) {
                return None;
            }
            let from = queue.active_index()?;
            (queue.track(from).cloned()?, from, queue.next_index()?)
        };
        // Something else (a sermon) finished on the shared engine.
        if !status
            .uri
            .as_deref()
            .is_some_and(|uri| self.holds_uri(&active, uri))
        {
            return None;
        }

        tracing::info!("Track finished, advancing {} -> {}", from, to);
        self.event_bus.publish(Event::AutoAdvanced { from, to });
        if let Err(e) = self.play_track(to) {
            tracing::warn!("Auto-advance to {} failed: {}", to, e);
        }
        Some(to)
    }

    /// Apply a schedule evaluation. Returns `true` when playback was forced to stop.
    pub fn apply_schedule(&self, window: &MeetingWindow) -> bool {
        let paused = window.is_music_paused;
        if self.music_paused.swap(paused, Ordering::AcqRel) != paused {
            tracing::info!("Music {}", if paused { "paused for meeting" } else { "resumed" });
            self.event_bus.publish(Event::MusicPauseChanged { paused });
        }

        if paused && self.engine.is_playing() {
            if let Err(e) = self.engine.stop() {
                tracing::warn!("Failed to stop for meeting: {}", e);
                return false;
            }
            return true;
        }
        false
    }

    pub fn music_paused(&self) -> bool {
        self.music_paused.load(Ordering::Acquire)
    }

    /// Whether the engine currently holds `track` (streamed or cached)
    pub fn is_track_current(&self, track: &Track) -> bool {
        self.engine
            .current_uri()
            .is_some_and(|current| self.holds_uri(track, &current))
    }

    /// Whether `uri` is `track`'s resolved link or its cached copy
    fn holds_uri(&self, track: &Track, uri: &str) -> bool {
        let Some(url) = link_resolver::resolve(&track.audio_url).into_playable() else {
            return false;
        };
        uri == url || self.cached_uri(&url).as_deref() == Some(uri)
    }

    pub fn link_error(&self) -> Option<LinkError> {
        self.link_error.lock().clone()
    }

    pub fn snapshot(&self) -> PlayerView {
        let (hero, active_index, track_count, shuffle, repeat) = {
            let queue = self.queue.lock();
            (
                queue.active_track().cloned(),
                queue.active_index(),
                queue.len(),
                queue.shuffle(),
                queue.repeat(),
            )
        };
        let status = self.engine.status();
        let hero_active = hero.as_ref().is_some_and(|t| self.is_track_current(t));
        let show_progress = hero_active && status.is_loaded;
        let (position_millis, duration_millis) = if show_progress {
            (status.position_millis, status.duration_millis)
        } else {
            (0, 0)
        };

        PlayerView {
            hero,
            active_index,
            track_count,
            hero_active,
            is_playing: hero_active && status.is_playing,
            position_millis,
            duration_millis,
            progress: progress_ratio(position_millis, duration_millis),
            link_error: self.link_error(),
            shuffle,
            repeat,
            music_paused: self.music_paused(),
            playback_error: status.error.map(|e| e.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::PlaybackState;
    use crate::cache::CacheStore;
    use crate::schedule::{MeetingSchedule, ScheduleGate};
    use crate::testing::{BackendCall, FakeBackend, FakeHttp};
    use chrono::NaiveDate;
    use std::path::Path;

    struct Fixture {
        player: MusicPlayer,
        backend: Arc<FakeBackend>,
        http: Arc<FakeHttp>,
        bus: EventBus,
    }

    fn fixture(cache_root: &Path, tracks: Vec<Track>) -> Fixture {
        let backend = Arc::new(FakeBackend::new());
        let http = Arc::new(FakeHttp::new());
        let bus = EventBus::new();
        let engine = Arc::new(PlaybackEngine::new(backend.clone(), bus.clone()));
        let store = Arc::new(CacheStore::new(cache_root, http.clone()));
        let prefetch = PrefetchScheduler::new(store, bus.clone());
        let player = MusicPlayer::new(engine, prefetch, bus.clone())
            .with_prefetch_count(0)
            .with_queue(QueueNavigator::with_seed(3));
        player.load_tracks(tracks);
        Fixture {
            player,
            backend,
            http,
            bus,
        }
    }

    fn track(id: &str, url: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Title {}", id),
            audio_url: url.to_string(),
            ..Track::default()
        }
    }

    fn three_tracks() -> Vec<Track> {
        vec![
            track("a", "https://cdn.example.org/a.mp3"),
            track("b", "https://cdn.example.org/b.mp3"),
            track("c", "https://cdn.example.org/c.mp3"),
        ]
    }

    fn window(hour: u32, minute: u32) -> MeetingWindow {
        let gate = ScheduleGate::new(MeetingSchedule::default()).unwrap();
        // 2024-03-05 is a Tuesday
        gate.evaluate_local(
            NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
        )
    }

    fn finished(uri: &str) -> PlaybackStatus {
        PlaybackStatus {
            uri: Some(uri.to_string()),
            state: PlaybackState::Stopped,
            did_just_finish: true,
            ..PlaybackStatus::default()
        }
    }

    #[test]
    fn test_play_streams_uncached_track() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());

        let outcome = fx.player.play_track(1).unwrap();
        assert_eq!(outcome, PlayOutcome::Engine(PlayTransition::Loaded));
        assert_eq!(
            fx.player.engine().current_uri().as_deref(),
            Some("https://cdn.example.org/b.mp3")
        );
        assert_eq!(fx.player.active_index(), Some(1));
    }

    #[test]
    fn test_cached_copy_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());
        let url = "https://cdn.example.org/a.mp3";
        let store = CacheStore::new(dir.path(), fx.http.clone());
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(store.path_for(url), b"cached").unwrap();

        fx.player.play_track(0).unwrap();
        let expected = store.path_for(url).to_string_lossy().into_owned();
        assert_eq!(fx.player.engine().current_uri(), Some(expected));
        assert!(fx.player.is_track_current(&three_tracks()[0]));
    }

    #[test]
    fn test_second_tap_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());

        fx.player.play_track(0).unwrap();
        assert_eq!(
            fx.player.toggle_play().unwrap(),
            PlayOutcome::Engine(PlayTransition::Paused)
        );
        assert_eq!(fx.backend.load_count("https://cdn.example.org/a.mp3"), 1);
    }

    #[test]
    fn test_rejected_link_sets_error_and_keeps_selection() {
        let dir = tempfile::tempdir().unwrap();
        let tracks = vec![
            track("a", "https://cdn.example.org/a.mp3"),
            track("f", "https://drive.google.com/drive/folders/xyz"),
        ];
        let fx = fixture(dir.path(), tracks);

        assert_eq!(fx.player.play_track(1).unwrap(), PlayOutcome::LinkRejected);
        assert_eq!(fx.player.active_index(), Some(1));
        assert_eq!(
            fx.player.link_error(),
            Some(LinkError {
                key: "f".to_string(),
                message: INVALID_LINK_MESSAGE.to_string()
            })
        );
        assert!(fx.backend.calls().is_empty());

        fx.player.play_track(0).unwrap();
        assert!(fx.player.link_error().is_none());
    }

    #[test]
    fn test_music_pause_blocks_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());
        let (events, _id) = fx.bus.subscribe();

        fx.player.play_track(0).unwrap();
        assert!(fx.player.apply_schedule(&window(20, 14)));
        assert_eq!(fx.player.engine().state(), PlaybackState::Stopped);
        assert!(events
            .try_iter()
            .any(|e| e == Event::MusicPauseChanged { paused: true }));

        assert_eq!(fx.player.play_track(2).unwrap(), PlayOutcome::MusicPaused);
        assert_eq!(fx.player.active_index(), Some(2));
        assert_eq!(fx.player.toggle_play().unwrap(), PlayOutcome::MusicPaused);

        assert!(!fx.player.apply_schedule(&window(22, 1)));
        assert!(!fx.player.music_paused());
    }

    #[test]
    fn test_finish_advances_once() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());
        fx.player.play_track(0).unwrap();

        let status = finished("https://cdn.example.org/a.mp3");
        assert_eq!(fx.player.handle_status(&status), Some(1));
        assert_eq!(fx.player.handle_status(&status), None);
        assert_eq!(fx.player.active_index(), Some(1));
        assert_eq!(fx.backend.load_count("https://cdn.example.org/b.mp3"), 1);
    }

    #[test]
    fn test_finish_of_other_audio_does_not_advance() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());
        fx.player.play_track(0).unwrap();
        fx.player
            .engine()
            .play("https://cdn.example.org/sermon.mp3")
            .unwrap();

        let status = finished("https://cdn.example.org/sermon.mp3");
        assert_eq!(fx.player.handle_status(&status), None);
        assert_eq!(fx.player.active_index(), Some(0));
        assert_eq!(fx.backend.load_count("https://cdn.example.org/b.mp3"), 0);
    }

    #[test]
    fn test_finish_with_repeat_does_not_advance() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());
        fx.player.play_track(0).unwrap();
        assert!(fx.player.toggle_repeat());
        assert!(fx.backend.is_looping("https://cdn.example.org/a.mp3"));

        let status = finished("https://cdn.example.org/a.mp3");
        assert_eq!(fx.player.handle_status(&status), None);
        assert_eq!(fx.player.active_index(), Some(0));
    }

    #[test]
    fn test_prev_and_next_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());
        fx.player.prev().unwrap();
        assert_eq!(fx.player.active_index(), Some(2));
        fx.player.next().unwrap();
        assert_eq!(fx.player.active_index(), Some(0));
        assert_eq!(
            fx.backend.calls().last(),
            Some(&BackendCall::Play("https://cdn.example.org/a.mp3".to_string()))
        );
    }

    #[test]
    fn test_load_warms_first_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let http = Arc::new(FakeHttp::new());
        for t in three_tracks() {
            http.insert(&t.audio_url, b"x".to_vec());
        }
        let bus = EventBus::new();
        let (events, _id) = bus.subscribe();
        let engine = Arc::new(PlaybackEngine::new(backend, bus.clone()));
        let store = Arc::new(CacheStore::new(dir.path(), http.clone()));
        let player = MusicPlayer::new(engine, PrefetchScheduler::new(store, bus.clone()), bus)
            .with_prefetch_count(2);

        let mut tracks = three_tracks();
        tracks.insert(0, track("f", "https://drive.google.com/drive/folders/xyz"));
        player.load_tracks(tracks);

        // The folder link is skipped, so a and b are warmed; c is not.
        let mut completed = std::collections::BTreeSet::new();
        while completed.len() < 2 {
            if let Event::PrefetchCompleted { url, .. } = events
                .recv_timeout(std::time::Duration::from_secs(5))
                .unwrap()
            {
                completed.insert(url);
            }
        }
        assert!(completed.contains("https://cdn.example.org/a.mp3"));
        assert!(completed.contains("https://cdn.example.org/b.mp3"));
        assert_eq!(http.download_count("https://cdn.example.org/c.mp3"), 0);
    }

    #[test]
    fn test_snapshot_reports_hero_progress() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture(dir.path(), three_tracks());
        fx.player.play_track(0).unwrap();
        fx.backend
            .set_position("https://cdn.example.org/a.mp3", std::time::Duration::from_secs(90));
        fx.player.engine().refresh_status();

        let view = fx.player.snapshot();
        assert!(view.hero_active);
        assert!(view.is_playing);
        assert_eq!(view.position_millis, 90_000);
        assert_eq!(view.duration_millis, 180_000);
        assert!((view.progress - 0.5).abs() < f64::EPSILON);
        assert_eq!(view.track_count, 3);
    }
}
