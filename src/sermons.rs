/// Sermon list playback
///
/// Sermons share the single playback engine with the music queue but have no
/// queue of their own: no shuffle, no repeat and no auto-advance. They stream
/// straight from their resolved link.
use std::sync::Arc;

use parking_lot::RwLock;

use crate::audio_system::{PlayTransition, PlaybackEngine};
use crate::error::PlaybackError;
use crate::feed::Track;
use crate::link_resolver::{self, ResolvedLink, INVALID_LINK_MESSAGE};
use crate::messaging::{Event, EventBus};
use crate::music_player::PlayOutcome;

pub struct SermonPlayer {
    sermons: RwLock<Vec<Track>>,
    engine: Arc<PlaybackEngine>,
    event_bus: EventBus,
}

impl SermonPlayer {
    pub fn new(engine: Arc<PlaybackEngine>, event_bus: EventBus) -> Self {
        Self {
            sermons: RwLock::new(Vec::new()),
            engine,
            event_bus,
        }
    }

    pub fn load(&self, sermons: Vec<Track>) {
        tracing::info!("Loaded {} sermon(s)", sermons.len());
        *self.sermons.write() = sermons;
    }

    pub fn sermons(&self) -> Vec<Track> {
        self.sermons.read().clone()
    }

    pub fn sermon(&self, index: usize) -> Option<Track> {
        self.sermons.read().get(index).cloned()
    }

    /// Play the sermon at `index`, or toggle it when it is already loaded
    pub fn play(&self, index: usize) -> Result<PlayOutcome, PlaybackError> {
        let Some(sermon) = self.sermon(index) else {
            return Ok(PlayOutcome::NoTrack);
        };
        let url = match link_resolver::resolve(&sermon.audio_url) {
            ResolvedLink::Playable(url) => url,
            ResolvedLink::Rejected(reason) => {
                tracing::warn!("Rejected sermon link for {}: {}", sermon.title, reason);
                self.event_bus.publish(Event::LinkRejected {
                    title: sermon.title,
                    message: INVALID_LINK_MESSAGE.to_string(),
                });
                return Ok(PlayOutcome::LinkRejected);
            }
        };

        let transition = self.engine.play(&url)?;
        if transition == PlayTransition::Loaded {
            // Music repeat must not carry over into a sermon.
            self.engine.set_looping(false);
        }
        Ok(PlayOutcome::Engine(transition))
    }

    /// Index of the sermon the engine currently holds
    pub fn current_index(&self) -> Option<usize> {
        let current = self.engine.current_uri()?;
        self.sermons.read().iter().position(|sermon| {
            link_resolver::resolve(&sermon.audio_url).into_playable().as_deref()
                == Some(current.as_str())
        })
    }

    /// Stop the engine if it holds a sermon. Returns whether anything stopped.
    pub fn stop(&self) -> Result<bool, PlaybackError> {
        if self.current_index().is_none() {
            return Ok(false);
        }
        self.engine.stop()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::PlaybackState;
    use crate::testing::{BackendCall, FakeBackend};

    const DRIVE: &str = "https://drive.google.com/file/d/sermon42/view";
    const DRIVE_DIRECT: &str = "https://drive.google.com/uc?export=download&id=sermon42";

    fn sermon(title: &str, url: &str) -> Track {
        Track {
            id: title.to_lowercase(),
            title: title.to_string(),
            audio_url: url.to_string(),
            ..Track::default()
        }
    }

    fn player() -> (SermonPlayer, Arc<PlaybackEngine>, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::new());
        let engine = Arc::new(PlaybackEngine::new(backend.clone(), EventBus::new()));
        let sermons = SermonPlayer::new(Arc::clone(&engine), EventBus::new());
        sermons.load(vec![
            sermon("Grace", DRIVE),
            sermon("Hope", "https://cdn.example.org/hope.mp3"),
            sermon("Folder", "https://drive.google.com/drive/folders/abc"),
        ]);
        (sermons, engine, backend)
    }

    #[test]
    fn test_play_streams_resolved_link_and_toggles() {
        let (sermons, engine, backend) = player();
        assert_eq!(
            sermons.play(0).unwrap(),
            PlayOutcome::Engine(PlayTransition::Loaded)
        );
        assert_eq!(engine.current_uri().as_deref(), Some(DRIVE_DIRECT));
        assert_eq!(sermons.current_index(), Some(0));

        assert_eq!(
            sermons.play(0).unwrap(),
            PlayOutcome::Engine(PlayTransition::Paused)
        );
        assert_eq!(backend.load_count(DRIVE_DIRECT), 1);
    }

    #[test]
    fn test_rejected_and_missing_sermons_do_not_play() {
        let (sermons, engine, backend) = player();
        assert_eq!(sermons.play(2).unwrap(), PlayOutcome::LinkRejected);
        assert_eq!(sermons.play(7).unwrap(), PlayOutcome::NoTrack);
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_sermon_does_not_inherit_looping() {
        let (sermons, engine, backend) = player();
        engine.set_looping(true);
        sermons.play(1).unwrap();
        assert!(!engine.is_looping());
        assert!(!backend.is_looping("https://cdn.example.org/hope.mp3"));
    }

    #[test]
    fn test_stop_only_touches_sermons() {
        let (sermons, engine, backend) = player();
        engine.play("https://cdn.example.org/hymn.mp3").unwrap();
        assert!(!sermons.stop().unwrap());
        assert_eq!(engine.state(), PlaybackState::Playing);

        sermons.play(1).unwrap();
        assert!(sermons.stop().unwrap());
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::Stop("https://cdn.example.org/hope.mp3".into()))
        );
    }
}
