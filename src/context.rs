/// Application context
///
/// The one place components are built and background threads started.
/// Dropping the context (or calling [`AppContext::shutdown`]) stops every
/// thread and releases the loaded sound resource.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context as _;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};

use crate::audio_system::{PlaybackEngine, SoundBackend, StatusMonitor};
use crate::cache::{CacheStore, PrefetchScheduler};
use crate::config::Config;
use crate::error::{AppResult, FeedError};
use crate::exporter::{DownloadExporter, ShareTarget};
use crate::feed;
use crate::http::HttpClient;
use crate::messaging::{Command, CommandExecutor, EventBus};
use crate::music_player::MusicPlayer;
use crate::schedule::{MeetingWindow, ScheduleGate};
use crate::sermons::SermonPlayer;

pub struct AppContext {
    config: Config,
    event_bus: EventBus,
    http: Arc<dyn HttpClient>,
    engine: Arc<PlaybackEngine>,
    player: Arc<MusicPlayer>,
    sermons: Arc<SermonPlayer>,
    gate: ScheduleGate,
    executor: CommandExecutor,
    monitor: Option<StatusMonitor>,
    stop_tx: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl AppContext {
    /// Build every component and start the background threads
    pub fn init(
        config: Config,
        backend: Arc<dyn SoundBackend>,
        http: Arc<dyn HttpClient>,
        share: Arc<dyn ShareTarget>,
    ) -> AppResult<Self> {
        config.validate().context("Invalid configuration")?;

        let event_bus = EventBus::new();
        let engine = Arc::new(PlaybackEngine::new(backend, event_bus.clone()));

        let cache_dir = config.resolved_cache_dir();
        tracing::info!("Audio cache: {}", cache_dir.display());
        let store = Arc::new(CacheStore::new(cache_dir, Arc::clone(&http)));
        let prefetch = PrefetchScheduler::new(store, event_bus.clone());
        let player = Arc::new(
            MusicPlayer::new(Arc::clone(&engine), prefetch, event_bus.clone())
                .with_prefetch_count(config.prefetch_count),
        );

        let sermons = Arc::new(SermonPlayer::new(Arc::clone(&engine), event_bus.clone()));

        let exporter = Arc::new(DownloadExporter::new(
            config.resolved_download_dir(),
            Arc::clone(&http),
            share,
            config.share_message.clone(),
            event_bus.clone(),
        ));
        let gate = ScheduleGate::new(config.schedule.clone())?;
        player.apply_schedule(&gate.now());

        let executor = CommandExecutor::new(
            Arc::clone(&player),
            Arc::clone(&sermons),
            exporter,
            event_bus.clone(),
        );
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let workers = vec![
            executor
                .start_processing()
                .context("Failed to start command executor")?,
            spawn_schedule_poller(
                gate.clone(),
                Arc::clone(&player),
                Duration::from_secs(config.schedule_poll_secs),
                stop_rx,
            )
            .context("Failed to start schedule poller")?,
        ];
        // Finished tracks advance the queue from the monitor thread.
        let listener = Arc::clone(&player);
        let monitor = StatusMonitor::start_with(
            &engine,
            Duration::from_millis(config.status_interval_ms),
            move |status| {
                listener.handle_status(status);
            },
        )
        .context("Failed to start status monitor")?;

        tracing::info!("Application context initialized");
        Ok(Self {
            config,
            event_bus,
            http,
            engine,
            player,
            sermons,
            gate,
            executor,
            monitor: Some(monitor),
            stop_tx: Some(stop_tx),
            workers,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn player(&self) -> &Arc<MusicPlayer> {
        &self.player
    }

    pub fn sermons(&self) -> &Arc<SermonPlayer> {
        &self.sermons
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    pub fn meeting_window(&self) -> MeetingWindow {
        self.gate.now()
    }

    /// Fetch the music feed and load it into the queue
    pub fn load_music(&self) -> Result<usize, FeedError> {
        let tracks = feed::fetch_tracks(
            self.http.as_ref(),
            &self.config.feed_base_url,
            &self.config.music_feed_key,
        )?;
        let count = tracks.len();
        self.player.load_tracks(tracks);
        Ok(count)
    }

    /// Fetch the sermon feed
    pub fn load_sermons(&self) -> Result<usize, FeedError> {
        let sermons = feed::fetch_tracks(
            self.http.as_ref(),
            &self.config.feed_base_url,
            &self.config.sermons_feed_key,
        )?;
        let count = sermons.len();
        self.sermons.load(sermons);
        Ok(count)
    }

    /// Queue a command for the executor thread
    pub fn submit(&self, command: Command) {
        self.executor.execute(command);
    }

    /// Stop background threads and release the sound resource. Idempotent.
    pub fn shutdown(&mut self) {
        if self.stop_tx.is_none() {
            return;
        }
        tracing::info!("Shutting down");

        self.executor.execute(Command::Quit);
        self.stop_tx.take();
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        // Close the engine before joining: commands still queued ahead of Quit
        // are ignored and a load in progress is discarded when it returns.
        self.engine.shutdown();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("A background thread panicked");
            }
        }
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Re-evaluate the meeting window on a fixed cadence
fn spawn_schedule_poller(
    gate: ScheduleGate,
    player: Arc<MusicPlayer>,
    interval: Duration,
    stop_rx: Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    let ticker = tick(interval);
    thread::Builder::new()
        .name("schedule-poller".to_string())
        .spawn(move || {
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if player.apply_schedule(&gate.now()) {
                            tracing::info!("Playback stopped for the meeting");
                        }
                    }
                }
            }
            tracing::debug!("Schedule poller stopped");
        })
}
