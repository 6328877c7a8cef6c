/// Playback engine
///
/// Owns at most one loaded sound resource and drives the playback state
/// machine. Every engine-level update is pushed to the status channel.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::backend::{ResourceStatus, SoundBackend, SoundResource};
use super::state::{PlayTransition, PlaybackState};
use super::status::{status_channel, PlaybackStatus, StatusError, StatusPublisher, StatusReceiver};
use crate::error::PlaybackError;
use crate::messaging::{Event, EventBus};

const NO_PENDING: u64 = 0;

struct EngineInner {
    state: PlaybackState,
    /// URI of the installed resource
    current_uri: Option<String>,
    /// URI being created while in `Loading`
    loading_uri: Option<String>,
    resource: Option<Box<dyn SoundResource>>,
    /// Bumped whenever an in-flight load must be discarded
    generation: u64,
    looping: bool,
    error: Option<StatusError>,
    last: ResourceStatus,
}

impl EngineInner {
    fn snapshot(&self, did_just_finish: bool) -> PlaybackStatus {
        let failed = self.state == PlaybackState::Error;
        PlaybackStatus {
            uri: self.current_uri.clone().or_else(|| self.loading_uri.clone()),
            state: self.state,
            is_loaded: self.resource.is_some() && !failed,
            is_playing: self.state == PlaybackState::Playing,
            is_buffering: self.state == PlaybackState::Loading
                || (self.state == PlaybackState::Playing && self.last.is_buffering),
            is_looping: self.looping,
            position_millis: if failed { 0 } else { millis(self.last.position) },
            duration_millis: if failed {
                0
            } else {
                self.last.duration.map(millis).unwrap_or(0)
            },
            did_just_finish,
            error: self.error.clone(),
        }
    }

    fn release(&mut self) -> Option<String> {
        let mut resource = self.resource.take()?;
        let uri = resource.uri().to_string();
        resource.unload();
        Some(uri)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Clears the pending flag on every exit path of `play()`
struct PendingGuard<'a> {
    pending: &'a AtomicU64,
    token: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // Only clear our own token; stop() may already have handed the flag to a newer call.
        let _ = self.pending.compare_exchange(
            self.token,
            NO_PENDING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Single-resource playback engine
pub struct PlaybackEngine {
    backend: Arc<dyn SoundBackend>,
    inner: Mutex<EngineInner>,
    pending: AtomicU64,
    next_token: AtomicU64,
    /// Set by `shutdown()`; no resource is loaded afterwards
    closed: AtomicBool,
    status_tx: StatusPublisher,
    event_bus: EventBus,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn SoundBackend>, event_bus: EventBus) -> Self {
        // Receivers come from subscribe(); the initial one is not kept.
        let (status_tx, _) = status_channel();
        Self {
            backend,
            inner: Mutex::new(EngineInner {
                state: PlaybackState::Idle,
                current_uri: None,
                loading_uri: None,
                resource: None,
                generation: 0,
                looping: false,
                error: None,
                last: ResourceStatus::default(),
            }),
            pending: AtomicU64::new(NO_PENDING),
            next_token: AtomicU64::new(NO_PENDING),
            closed: AtomicBool::new(false),
            status_tx,
            event_bus,
        }
    }

    /// Play `uri`, or toggle play/pause when it is already loaded.
    ///
    /// Calls made while another transition is pending are dropped and
    /// return [`PlayTransition::Busy`]. After [`PlaybackEngine::shutdown`]
    /// every call is [`PlayTransition::Ignored`].
    pub fn play(&self, uri: &str) -> Result<PlayTransition, PlaybackError> {
        if uri.is_empty() {
            return Ok(PlayTransition::Ignored);
        }
        if self.is_closed() {
            tracing::debug!("Ignored play({}) after shutdown", uri);
            return Ok(PlayTransition::Ignored);
        }
        let Some(_guard) = self.begin_transition() else {
            tracing::debug!("Dropped play({}) while a transition is pending", uri);
            return Ok(PlayTransition::Busy);
        };

        let same_resource = {
            let inner = self.inner.lock();
            inner.resource.is_some()
                && inner.state != PlaybackState::Error
                && inner.current_uri.as_deref() == Some(uri)
        };

        if same_resource {
            self.toggle()
        } else {
            self.load_and_play(uri)
        }
    }

    fn begin_transition(&self) -> Option<PendingGuard<'_>> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending
            .compare_exchange(NO_PENDING, token, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PendingGuard {
                pending: &self.pending,
                token,
            })
    }

    pub fn is_transition_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) != NO_PENDING
    }

    fn toggle(&self) -> Result<PlayTransition, PlaybackError> {
        let mut inner = self.inner.lock();
        let Some(resource) = inner.resource.as_mut() else {
            return Ok(PlayTransition::Ignored);
        };
        let uri = resource.uri().to_string();
        let live = resource.poll();

        let result = if live.is_playing {
            resource.pause().map(|_| PlayTransition::Paused)
        } else {
            resource.play().map(|_| PlayTransition::Resumed)
        };

        match result {
            Ok(transition) => {
                inner.state = if transition == PlayTransition::Paused {
                    PlaybackState::Paused
                } else {
                    PlaybackState::Playing
                };
                inner.last = ResourceStatus {
                    is_playing: inner.state.is_playing(),
                    did_just_finish: false,
                    ..live
                };
                let status = inner.snapshot(false);
                drop(inner);
                tracing::debug!("{} -> {}", uri, status.state.description());
                self.emit(status);
                Ok(transition)
            }
            Err(e) => {
                inner.state = PlaybackState::Error;
                inner.error = Some(StatusError {
                    uri: uri.clone(),
                    message: e.to_string(),
                });
                let status = inner.snapshot(false);
                drop(inner);
                tracing::error!("Audio play error for {}: {}", uri, e);
                self.emit_failure(&uri, &e.to_string());
                self.emit(status);
                Err(e)
            }
        }
    }

    fn load_and_play(&self, uri: &str) -> Result<PlayTransition, PlaybackError> {
        let (generation, looping, loading_status) = {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.release() {
                tracing::debug!("Unloaded {}", previous);
            }
            inner.generation += 1;
            inner.state = PlaybackState::Loading;
            inner.current_uri = None;
            inner.loading_uri = Some(uri.to_string());
            inner.error = None;
            inner.last = ResourceStatus::default();
            (inner.generation, inner.looping, inner.snapshot(false))
        };
        tracing::info!("Loading audio: {}", uri);
        self.emit(loading_status);

        let loaded = self.backend.load(uri);

        let mut inner = self.inner.lock();
        // shutdown() bumps the generation under this lock, so a closed engine lands here too.
        if inner.generation != generation || self.is_closed() {
            drop(inner);
            tracing::debug!("Discarding superseded load of {}", uri);
            if let Ok(mut resource) = loaded {
                resource.unload();
            }
            return Ok(PlayTransition::Superseded);
        }

        let started = loaded.and_then(|mut resource| {
            if looping {
                if let Err(e) = resource.set_looping(true) {
                    tracing::warn!("Audio loop error: {}", e);
                }
            }
            match resource.play() {
                Ok(()) => Ok(resource),
                Err(e) => {
                    resource.unload();
                    Err(e)
                }
            }
        });

        match started {
            Ok(resource) => {
                inner.resource = Some(resource);
                inner.current_uri = Some(uri.to_string());
                inner.loading_uri = None;
                inner.state = PlaybackState::Playing;
                inner.last.is_playing = true;
                let status = inner.snapshot(false);
                drop(inner);
                tracing::info!("Playing audio: {}", uri);
                self.emit(status);
                Ok(PlayTransition::Loaded)
            }
            Err(e) => {
                inner.loading_uri = None;
                inner.current_uri = None;
                inner.state = PlaybackState::Error;
                inner.error = Some(StatusError {
                    uri: uri.to_string(),
                    message: e.to_string(),
                });
                let mut status = inner.snapshot(false);
                status.uri = Some(uri.to_string());
                drop(inner);
                tracing::error!("Audio play error for {}: {}", uri, e);
                self.emit_failure(uri, &e.to_string());
                self.emit(status);
                Err(e)
            }
        }
    }

    /// Halt playback, keeping the resource loaded. Clears the pending flag.
    ///
    /// A load still in progress is discarded when it completes.
    pub fn stop(&self) -> Result<(), PlaybackError> {
        self.pending.store(NO_PENDING, Ordering::Release);

        let mut inner = self.inner.lock();
        if inner.state == PlaybackState::Loading {
            inner.generation += 1;
            inner.loading_uri = None;
            inner.state = PlaybackState::Idle;
            let status = inner.snapshot(false);
            drop(inner);
            tracing::debug!("Stopped while loading");
            self.emit(status);
            return Ok(());
        }

        let Some(resource) = inner.resource.as_mut() else {
            return Ok(());
        };
        let uri = resource.uri().to_string();
        if let Err(e) = resource.stop() {
            tracing::warn!("Audio stop error for {}: {}", uri, e);
            return Err(e);
        }
        if inner.state != PlaybackState::Error {
            inner.state = PlaybackState::Stopped;
        }
        inner.last.is_playing = false;
        inner.last.position = Duration::ZERO;
        let status = inner.snapshot(false);
        drop(inner);
        tracing::debug!("Stopped audio: {}", uri);
        self.emit(status);
        Ok(())
    }

    /// Best-effort looping for the loaded resource and any later load
    pub fn set_looping(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.looping = enabled;
        if let Some(resource) = inner.resource.as_mut() {
            if let Err(e) = resource.set_looping(enabled) {
                tracing::warn!("Audio loop error: {}", e);
            }
        }
    }

    /// Poll the loaded resource and publish the resulting status.
    ///
    /// Returns `None` without publishing when nothing is loaded or the
    /// resource already failed.
    pub fn refresh_status(&self) -> Option<PlaybackStatus> {
        let mut inner = self.inner.lock();
        if inner.state == PlaybackState::Error {
            return None;
        }
        let resource = inner.resource.as_mut()?;
        let uri = resource.uri().to_string();
        let live = resource.poll();

        if let Some(message) = live.error.clone() {
            inner.state = PlaybackState::Error;
            inner.error = Some(StatusError {
                uri: uri.clone(),
                message: message.clone(),
            });
            inner.last = ResourceStatus::default();
            let status = inner.snapshot(false);
            drop(inner);
            tracing::error!("Audio stream failed for {}: {}", uri, message);
            self.emit_failure(&uri, &message);
            self.emit(status.clone());
            return Some(status);
        }

        let finished = live.did_just_finish;
        if finished {
            inner.state = PlaybackState::Stopped;
        }
        inner.last = live;
        let status = inner.snapshot(finished);
        inner.last.did_just_finish = false;
        drop(inner);

        if finished {
            tracing::info!("Finished audio: {}", uri);
            self.event_bus.publish(Event::PlaybackStateChanged {
                uri: Some(uri),
                state: PlaybackState::Stopped,
            });
        }
        self.status_tx.publish(status.clone());
        Some(status)
    }

    /// Current status without polling the resource
    pub fn status(&self) -> PlaybackStatus {
        self.inner.lock().snapshot(false)
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    /// URI of the installed resource
    pub fn current_uri(&self) -> Option<String> {
        self.inner.lock().current_uri.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().state.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.inner.lock().looping
    }

    /// Number of loaded resources (0 or 1)
    pub fn loaded_count(&self) -> usize {
        usize::from(self.inner.lock().resource.is_some())
    }

    /// A receiver positioned at the current status
    pub fn subscribe(&self) -> StatusReceiver {
        self.status_tx.subscribe()
    }

    /// Release the loaded resource regardless of playback state
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        if let Some(uri) = inner.release() {
            tracing::debug!("Released audio: {}", uri);
        }
        inner.state = PlaybackState::Idle;
        inner.current_uri = None;
        inner.loading_uri = None;
        inner.last = ResourceStatus::default();
    }

    /// Release the resource and close the status channel. Later `play()`
    /// calls are ignored and a load still in progress is discarded.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.release();
        self.status_tx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn emit(&self, status: PlaybackStatus) {
        self.event_bus.publish(Event::PlaybackStateChanged {
            uri: status.uri.clone(),
            state: status.state,
        });
        self.status_tx.publish(status);
    }

    fn emit_failure(&self, uri: &str, message: &str) {
        self.event_bus.publish(Event::PlaybackFailed {
            uri: uri.to_string(),
            message: message.to_string(),
        });
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
