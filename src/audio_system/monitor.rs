/// Periodic status polling
///
/// Rodio reports nothing on its own, so a ticker thread samples the engine
/// and lets it publish the resulting status. An optional handler sees every
/// sampled status on the monitor thread, so finish reports are never lost to
/// the single-slot channel overwriting them.
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use super::engine::PlaybackEngine;
use super::status::PlaybackStatus;

pub struct StatusMonitor {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StatusMonitor {
    /// Start polling `engine` every `interval`. The thread exits when the
    /// monitor is stopped or the engine is dropped.
    pub fn start(engine: &Arc<PlaybackEngine>, interval: Duration) -> std::io::Result<Self> {
        Self::start_with(engine, interval, |_| {})
    }

    /// Like [`StatusMonitor::start`], also passing each sampled status to `on_status`
    pub fn start_with<F>(
        engine: &Arc<PlaybackEngine>,
        interval: Duration,
        on_status: F,
    ) -> std::io::Result<Self>
    where
        F: Fn(&PlaybackStatus) + Send + 'static,
    {
        let engine: Weak<PlaybackEngine> = Arc::downgrade(engine);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name("status-monitor".to_string())
            .spawn(move || {
                tracing::debug!("Status monitor started ({:?})", interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            let Some(engine) = engine.upgrade() else { break };
                            let status = engine.refresh_status();
                            // Release the engine before the handler, which may load the next track.
                            drop(engine);
                            if let Some(status) = status {
                                on_status(&status);
                            }
                        }
                    }
                }
                tracing::debug!("Status monitor stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
