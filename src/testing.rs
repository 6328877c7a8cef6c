//! In-process fakes shared by unit tests

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::audio_system::{ResourceStatus, SoundBackend, SoundResource};
use crate::error::{HttpError, PlaybackError};
use crate::http::HttpClient;

/// One-shot latch that blocks a fake operation until released
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn release(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }
}

#[derive(Default)]
struct HttpState {
    bodies: HashMap<String, Vec<u8>>,
    json: HashMap<String, serde_json::Value>,
    failures: HashMap<String, u16>,
    requests: HashMap<String, usize>,
    holds: HashMap<String, Arc<Gate>>,
}

/// Canned responses keyed by exact URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeHttp {
    state: Mutex<HttpState>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, body: Vec<u8>) {
        self.state.lock().bodies.insert(url.to_string(), body);
    }

    pub fn insert_json(&self, url: &str, value: serde_json::Value) {
        self.state.lock().json.insert(url.to_string(), value);
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.state.lock().failures.insert(url.to_string(), status);
    }

    /// Block requests for `url` until the returned gate is released
    pub fn hold(&self, url: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.state
            .lock()
            .holds
            .insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn download_count(&self, url: &str) -> usize {
        self.state.lock().requests.get(url).copied().unwrap_or(0)
    }

    pub fn total_downloads(&self) -> usize {
        self.state.lock().requests.values().sum()
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let gate = self.state.lock().holds.get(url).cloned();
        if let Some(gate) = gate {
            gate.wait();
        }

        let mut state = self.state.lock();
        *state.requests.entry(url.to_string()).or_insert(0) += 1;
        if let Some(status) = state.failures.get(url) {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        if let Some(value) = state.json.get(url) {
            return Ok(value.to_string().into_bytes());
        }
        state
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| HttpError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

impl HttpClient for FakeHttp {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.respond(url)
    }

    fn get_json(&self, url: &str) -> Result<serde_json::Value, HttpError> {
        let body = self.respond(url)?;
        serde_json::from_slice(&body).map_err(|e| HttpError::Parse {
            url: url.to_string(),
            source: Box::new(e),
        })
    }

    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        let body = self.respond(url)?;
        fs::write(dest, &body).map_err(|source| HttpError::Io {
            path: dest.display().to_string(),
            source,
        })?;
        Ok(body.len() as u64)
    }
}

/// Calls observed by [`FakeBackend`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Load(String),
    Play(String),
    Pause(String),
    Stop(String),
    Unload(String),
}

#[derive(Default)]
struct SoundState {
    playing: bool,
    looping: bool,
    position: Duration,
    finished: bool,
    error: Option<String>,
}

#[derive(Default)]
struct BackendState {
    calls: Vec<BackendCall>,
    load_failures: HashMap<String, String>,
    looping_failures: HashSet<String>,
    holds: HashMap<String, Arc<Gate>>,
    live: HashMap<String, SoundState>,
}

#[derive(Default)]
struct BackendShared {
    state: Mutex<BackendState>,
    changed: Condvar,
}

/// Scriptable [`SoundBackend`] that records every resource call
#[derive(Default)]
pub struct FakeBackend {
    shared: Arc<BackendShared>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.shared.state.lock().calls.clone()
    }

    pub fn load_count(&self, uri: &str) -> usize {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| **call == BackendCall::Load(uri.to_string()))
            .count()
    }

    pub fn live_resources(&self) -> usize {
        self.shared.state.lock().live.len()
    }

    pub fn fail_load(&self, uri: &str, message: &str) {
        self.shared
            .state
            .lock()
            .load_failures
            .insert(uri.to_string(), message.to_string());
    }

    pub fn fail_looping(&self, uri: &str) {
        self.shared
            .state
            .lock()
            .looping_failures
            .insert(uri.to_string());
    }

    /// Block `load(uri)` until the returned gate is released
    pub fn hold(&self, uri: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.shared
            .state
            .lock()
            .holds
            .insert(uri.to_string(), Arc::clone(&gate));
        gate
    }

    /// Wait until `load(uri)` has been entered
    pub fn wait_for_load(&self, uri: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let expected = BackendCall::Load(uri.to_string());
        let mut state = self.shared.state.lock();
        while !state.calls.contains(&expected) {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                panic!("load({}) was never called", uri);
            }
        }
    }

    pub fn is_looping(&self, uri: &str) -> bool {
        self.shared
            .state
            .lock()
            .live
            .get(uri)
            .map(|sound| sound.looping)
            .unwrap_or(false)
    }

    pub fn set_position(&self, uri: &str, position: Duration) {
        if let Some(sound) = self.shared.state.lock().live.get_mut(uri) {
            sound.position = position;
        }
    }

    /// Make the next poll of `uri` report a natural finish
    pub fn finish(&self, uri: &str) {
        if let Some(sound) = self.shared.state.lock().live.get_mut(uri) {
            sound.playing = false;
            sound.finished = true;
        }
    }

    /// Make `uri` report a stream failure from now on
    pub fn fail_stream(&self, uri: &str, message: &str) {
        if let Some(sound) = self.shared.state.lock().live.get_mut(uri) {
            sound.playing = false;
            sound.error = Some(message.to_string());
        }
    }
}

impl SoundBackend for FakeBackend {
    fn load(&self, uri: &str) -> Result<Box<dyn SoundResource>, PlaybackError> {
        let gate = {
            let mut state = self.shared.state.lock();
            state.calls.push(BackendCall::Load(uri.to_string()));
            state.holds.get(uri).cloned()
        };
        self.shared.changed.notify_all();
        if let Some(gate) = gate {
            gate.wait();
        }

        let mut state = self.shared.state.lock();
        if let Some(message) = state.load_failures.get(uri) {
            return Err(PlaybackError::LoadFailed {
                uri: uri.to_string(),
                message: message.clone(),
            });
        }
        state.live.insert(uri.to_string(), SoundState::default());
        Ok(Box::new(FakeSound {
            uri: uri.to_string(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeSound {
    uri: String,
    shared: Arc<BackendShared>,
}

impl FakeSound {
    fn record(&self, call: BackendCall, apply: impl FnOnce(&mut SoundState)) {
        let mut state = self.shared.state.lock();
        state.calls.push(call);
        if let Some(sound) = state.live.get_mut(&self.uri) {
            apply(sound);
        }
    }
}

impl SoundResource for FakeSound {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.record(BackendCall::Play(self.uri.clone()), |sound| {
            sound.playing = true;
            sound.finished = false;
        });
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.record(BackendCall::Pause(self.uri.clone()), |sound| {
            sound.playing = false;
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.record(BackendCall::Stop(self.uri.clone()), |sound| {
            sound.playing = false;
            sound.position = Duration::ZERO;
        });
        Ok(())
    }

    fn set_looping(&mut self, enabled: bool) -> Result<(), PlaybackError> {
        let mut state = self.shared.state.lock();
        if state.looping_failures.contains(&self.uri) {
            return Err(PlaybackError::PlaybackFailed(
                "looping not supported".to_string(),
            ));
        }
        if let Some(sound) = state.live.get_mut(&self.uri) {
            sound.looping = enabled;
        }
        Ok(())
    }

    fn poll(&mut self) -> ResourceStatus {
        let mut state = self.shared.state.lock();
        let Some(sound) = state.live.get_mut(&self.uri) else {
            return ResourceStatus::default();
        };
        let did_just_finish = std::mem::take(&mut sound.finished);
        ResourceStatus {
            is_playing: sound.playing,
            is_buffering: false,
            position: sound.position,
            duration: Some(Duration::from_secs(180)),
            did_just_finish,
            is_looping: sound.looping,
            error: sound.error.clone(),
        }
    }

    fn unload(&mut self) {
        let mut state = self.shared.state.lock();
        state.calls.push(BackendCall::Unload(self.uri.clone()));
        state.live.remove(&self.uri);
    }
}
