/// Messaging module for Event/Command architecture
///
/// This module implements the Event/Command segregation pattern:
/// - **Events**: Notifications of things that happened (past tense, broadcast)
/// - **Commands**: Requests to perform actions (imperative, targeted)
///
/// ## Architecture
///
/// ```text
/// ┌─────────┐     Command      ┌──────────┐     Event      ┌─────────────┐
/// │  Input  │ ───────────────> │ Executor │ ─────────────> │  Event Bus  │
/// │  (CLI)  │                  │ (player) │                │             │
/// └─────────┘                  └──────────┘                └─────────────┘
///                                                                 │
///                                                                 │ Publishes
///                                                                 ▼
///                                                         ┌──────────────┐
///                                                         │  Listeners   │
///                                                         │ (CLI output, │
///                                                         │    tests)    │
///                                                         └──────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let event_bus = EventBus::new();
/// let (rx, _id) = event_bus.subscribe();
///
/// let executor = CommandExecutor::new(player, sermons, exporter, event_bus.clone());
/// executor.start_processing()?;
/// executor.execute(Command::parse("play 2")?);
///
/// while let Ok(event) = rx.recv() {
///     match event {
///         Event::LinkRejected { message, .. } => eprintln!("{}", message),
///         Event::Shutdown => break,
///         _ => {}
///     }
/// }
/// ```

pub mod bus;
pub mod commands;
pub mod events;
pub mod executor;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use commands::{Command, CommandResult};
pub use events::Event;
pub use executor::CommandExecutor;
