/// Command executor
///
/// Runs player commands on a worker thread so the input loop never waits
/// on network or audio I/O.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::bus::EventBus;
use super::commands::{Command, CommandResult};
use super::events::Event;
use crate::exporter::DownloadExporter;
use crate::feed::Track;
use crate::music_player::{MusicPlayer, PlayOutcome};
use crate::sermons::SermonPlayer;

/// Executes commands against the players and exporter
struct Handler {
    player: Arc<MusicPlayer>,
    sermons: Arc<SermonPlayer>,
    exporter: Arc<DownloadExporter>,
    event_bus: EventBus,
}

impl Handler {
    fn execute(&self, command: Command) -> CommandResult {
        tracing::info!("Executing command: {}", command.description());

        match command {
            Command::PlayTrack { index } => outcome(self.player.play_track(index)),
            Command::TogglePlay => outcome(self.player.toggle_play()),
            Command::Next => outcome(self.player.next()),
            Command::Prev => outcome(self.player.prev()),
            Command::Stop => match self.player.stop() {
                Ok(()) => CommandResult::Success,
                Err(e) => CommandResult::Error(e.to_string()),
            },
            Command::ToggleShuffle => {
                let on = self.player.toggle_shuffle();
                CommandResult::SuccessWithValue(format!("Shuffle {}", on_off(on)))
            }
            Command::ToggleRepeat => {
                let on = self.player.toggle_repeat();
                CommandResult::SuccessWithValue(format!("Repeat {}", on_off(on)))
            }
            Command::Download { index } => {
                self.export(self.player.tracks().into_iter().nth(index), "track", index)
            }
            Command::PlaySermon { index } => outcome(self.sermons.play(index)),
            Command::StopSermon => match self.sermons.stop() {
                Ok(true) => CommandResult::Success,
                Ok(false) => CommandResult::SuccessWithValue("No sermon is playing".to_string()),
                Err(e) => CommandResult::Error(e.to_string()),
            },
            Command::DownloadSermon { index } => {
                self.export(self.sermons.sermon(index), "sermon", index)
            }
            Command::Quit => {
                self.event_bus.publish(Event::Shutdown);
                CommandResult::Success
            }
        }
    }

    fn export(&self, track: Option<Track>, kind: &str, index: usize) -> CommandResult {
        match track {
            Some(track) => {
                // Progress arrives as ExportStatusChanged events.
                drop(self.exporter.download(&track));
                CommandResult::Success
            }
            None => CommandResult::Error(format!("No {} {}", kind, index + 1)),
        }
    }
}

/// Command executor that processes commands and emits events
pub struct CommandExecutor {
    command_tx: Sender<Command>,
    command_rx: Receiver<Command>,
    handler: Arc<Handler>,
}

impl CommandExecutor {
    pub fn new(
        player: Arc<MusicPlayer>,
        sermons: Arc<SermonPlayer>,
        exporter: Arc<DownloadExporter>,
        event_bus: EventBus,
    ) -> Self {
        let (tx, rx) = unbounded();

        Self {
            command_tx: tx,
            command_rx: rx,
            handler: Arc::new(Handler {
                player,
                sermons,
                exporter,
                event_bus,
            }),
        }
    }

    /// Get a sender for submitting commands
    pub fn sender(&self) -> Sender<Command> {
        self.command_tx.clone()
    }

    /// Execute a command immediately (blocking)
    pub fn execute_sync(&self, command: Command) -> CommandResult {
        self.handler.execute(command)
    }

    /// Queue a command for the processing thread
    pub fn execute(&self, command: Command) {
        let _ = self.command_tx.send(command);
    }

    /// Start the command processing loop in a background thread.
    /// The loop ends after `Quit`.
    pub fn start_processing(&self) -> std::io::Result<JoinHandle<()>> {
        let rx = self.command_rx.clone();
        let handler = Arc::clone(&self.handler);

        thread::Builder::new()
            .name("command-executor".to_string())
            .spawn(move || {
                tracing::info!("Command executor thread started");

                while let Ok(command) = rx.recv() {
                    let quit = command == Command::Quit;
                    match handler.execute(command) {
                        CommandResult::Error(message) => {
                            tracing::warn!("Command failed: {}", message)
                        }
                        CommandResult::SuccessWithValue(value) => tracing::info!("{}", value),
                        CommandResult::Success => {}
                    }
                    if quit {
                        tracing::info!("Quit command received, stopping executor");
                        break;
                    }
                }

                tracing::info!("Command executor thread stopped");
            })
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn outcome(result: Result<PlayOutcome, crate::error::PlaybackError>) -> CommandResult {
    match result {
        Ok(PlayOutcome::Engine(transition)) => {
            CommandResult::SuccessWithValue(format!("{:?}", transition))
        }
        Ok(PlayOutcome::MusicPaused) => {
            CommandResult::Error("Music is paused during the meeting".to_string())
        }
        Ok(PlayOutcome::LinkRejected) => {
            CommandResult::Error(crate::link_resolver::INVALID_LINK_MESSAGE.to_string())
        }
        Ok(PlayOutcome::NoTrack) => CommandResult::Error("No such track".to_string()),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}
