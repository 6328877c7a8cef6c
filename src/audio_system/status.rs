/// Playback status and its single-slot delivery channel
///
/// The engine overwrites one shared slot on every update. Receivers always
/// observe the newest value; intermediate updates a slow receiver missed are
/// gone, never queued.
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::state::PlaybackState;

/// Error captured from a failed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub uri: String,
    pub message: String,
}

/// Full engine status, emitted after every engine-level update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub uri: Option<String>,
    pub state: PlaybackState,
    pub is_loaded: bool,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub is_looping: bool,
    pub position_millis: u64,
    pub duration_millis: u64,
    pub did_just_finish: bool,
    pub error: Option<StatusError>,
}

impl PlaybackStatus {
    /// Whether this status reports a finish of `uri`
    pub fn finished(&self, uri: &str) -> bool {
        self.did_just_finish && self.uri.as_deref() == Some(uri)
    }
}

struct Slot {
    version: u64,
    value: Option<PlaybackStatus>,
    closed: bool,
}

struct Shared {
    slot: Mutex<Slot>,
    changed: Condvar,
}

/// Writing half of the status channel
#[derive(Clone)]
pub struct StatusPublisher {
    shared: Arc<Shared>,
}

/// Reading half of the status channel. Clones track their own position.
#[derive(Clone)]
pub struct StatusReceiver {
    shared: Arc<Shared>,
    seen: u64,
}

/// Create a connected publisher/receiver pair
pub fn status_channel() -> (StatusPublisher, StatusReceiver) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot {
            version: 0,
            value: None,
            closed: false,
        }),
        changed: Condvar::new(),
    });
    (
        StatusPublisher {
            shared: Arc::clone(&shared),
        },
        StatusReceiver { shared, seen: 0 },
    )
}

impl StatusPublisher {
    /// Overwrite the slot and wake waiting receivers
    pub fn publish(&self, status: PlaybackStatus) {
        let mut slot = self.shared.slot.lock();
        if slot.closed {
            return;
        }
        slot.version += 1;
        slot.value = Some(status);
        drop(slot);
        self.shared.changed.notify_all();
    }

    /// Close the channel; blocked receivers return `None`
    pub fn close(&self) {
        self.shared.slot.lock().closed = true;
        self.shared.changed.notify_all();
    }

    /// A new receiver positioned at the current value
    pub fn subscribe(&self) -> StatusReceiver {
        let seen = self.shared.slot.lock().version;
        StatusReceiver {
            shared: Arc::clone(&self.shared),
            seen,
        }
    }
}

impl StatusReceiver {
    /// Newest value without waiting, whether or not it was seen before
    pub fn latest(&self) -> Option<PlaybackStatus> {
        self.shared.slot.lock().value.clone()
    }

    /// Newest unseen value, if any
    pub fn try_recv(&mut self) -> Option<PlaybackStatus> {
        let slot = self.shared.slot.lock();
        if slot.version > self.seen {
            self.seen = slot.version;
            slot.value.clone()
        } else {
            None
        }
    }

    /// Wait up to `timeout` for a value newer than the last one seen.
    ///
    /// Returns `None` on timeout or when the channel is closed.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<PlaybackStatus> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        loop {
            if slot.version > self.seen {
                self.seen = slot.version;
                return slot.value.clone();
            }
            if slot.closed {
                return None;
            }
            if self.shared.changed.wait_until(&mut slot, deadline).timed_out() {
                return None;
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.slot.lock().closed
    }
}
