/// Prefetch scheduler
///
/// Warms the cache in the background ahead of playback. A URL that is
/// already downloading is not scheduled again; failures are logged and
/// reported on the event bus, never to the caller.
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

use super::store::CacheStore;
use crate::messaging::{Event, EventBus};

/// Background cache warmer
#[derive(Clone)]
pub struct PrefetchScheduler {
    store: Arc<CacheStore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    warmed: Arc<RwLock<HashMap<String, PathBuf>>>,
    event_bus: EventBus,
}

impl PrefetchScheduler {
    pub fn new(store: Arc<CacheStore>, event_bus: EventBus) -> Self {
        Self {
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            warmed: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Start warming `url` in the background.
    ///
    /// Returns `None` when the URL is empty, already warmed this session (and
    /// still on disk), or a warm for it is already running. The handle may be
    /// dropped; it only exists so callers can wait on it.
    pub fn warm(&self, url: &str) -> Option<JoinHandle<()>> {
        if url.is_empty() {
            return None;
        }
        if self.cached_path(url).is_some_and(|path| path.is_file()) {
            tracing::trace!("Already warmed {}", url);
            return None;
        }
        if !self.in_flight.lock().insert(url.to_string()) {
            tracing::trace!("Prefetch already running for {}", url);
            return None;
        }

        let key = url.to_string();
        let owned = key.clone();
        let scheduler = self.clone();
        let spawned = thread::Builder::new()
            .name("prefetch".to_string())
            .spawn(move || scheduler.run(owned));

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("Failed to start prefetch thread: {}", e);
                self.in_flight.lock().remove(&key);
                None
            }
        }
    }

    fn run(&self, url: String) {
        tracing::debug!("Prefetching {}", url);
        match self.store.try_ensure(&url) {
            Ok(path) => {
                self.warmed.write().insert(url.clone(), path.clone());
                self.event_bus.publish(Event::PrefetchCompleted {
                    url: url.clone(),
                    path,
                });
            }
            Err(e) => {
                tracing::warn!("Prefetch failed for {}: {}", url, e);
                self.event_bus.publish(Event::PrefetchFailed {
                    url: url.clone(),
                    message: e.to_string(),
                });
            }
        }
        self.in_flight.lock().remove(&url);
    }

    /// Local path of a URL warmed during this session
    pub fn cached_path(&self, url: &str) -> Option<PathBuf> {
        self.warmed.read().get(url).cloned()
    }

    /// Warmed path, falling back to a file already present in the cache directory
    pub fn local_copy(&self, url: &str) -> Option<PathBuf> {
        self.cached_path(url).or_else(|| self.store.lookup(url))
    }

    pub fn is_in_flight(&self, url: &str) -> bool {
        self.in_flight.lock().contains(url)
    }
}
