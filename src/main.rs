use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use sysinfo::System;

use chapel_audio::config::Config;
use chapel_audio::context::AppContext;
use chapel_audio::exporter::SystemShare;
use chapel_audio::http::UreqClient;
use chapel_audio::messaging::{Command, Event, EventBus};
use chapel_audio::utils::{format_countdown, format_time, progress_bar};
use chapel_audio::{AppResult, RodioBackend};

const LOG_TARGET_STARTUP: &str = "chapel_audio::startup";

/// Initialize tracing with file rotation
///
/// Logs are written to `<config-dir>/ChapelAudio/logs/`, one file per day
/// (`chapel-audio.YYYY-MM-DD.log`). Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = Config::log_dir().unwrap_or_else(|_| std::path::PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "chapel-audio.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let mut system = System::new_all();
    system.refresh_all();

    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting Chapel Audio v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}

fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    println!("===========================================");
    println!("  Chapel Audio");
    println!("===========================================\n");

    let config = Config::load().context("Failed to load configuration")?;
    let http = Arc::new(UreqClient::new(Duration::from_secs(config.http_timeout_secs)));
    let backend = Arc::new(RodioBackend::new().context("No audio output")?);
    let mut ctx = AppContext::init(config, backend, http, Arc::new(SystemShare))?;

    spawn_event_printer(ctx.event_bus());

    if ctx.config().feed_base_url.trim().is_empty() {
        tracing::warn!("feed_base_url is not configured; the music list is empty");
        println!("✗ No feed configured. Set feed_base_url in the config file.");
    } else {
        match ctx.load_music() {
            Ok(count) => println!("✓ Loaded {} track(s)", count),
            Err(e) => {
                tracing::error!("Failed to load music: {}", e);
                println!("✗ Failed to load music: {}", e);
            }
        }
        match ctx.load_sermons() {
            Ok(count) => println!("✓ Loaded {} sermon(s)", count),
            Err(e) => {
                tracing::error!("Failed to load sermons: {}", e);
                println!("✗ Could not load sermons: {}", e);
            }
        }
    }

    print_help();
    run_input_loop(&ctx)?;

    ctx.shutdown();
    println!("Goodbye.");
    Ok(())
}

fn run_input_loop(ctx: &AppContext) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "help" | "?" => print_help(),
            "list" => print_tracks(ctx),
            "sermons" => print_sermons(ctx),
            "status" => print_status(ctx),
            "meeting" => print_meeting(ctx),
            _ => match Command::parse(line) {
                Ok(Command::Quit) => return Ok(()),
                Ok(command) => ctx.submit(command),
                Err(message) => println!("{}", message),
            },
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  list                 Show the music list");
    println!("  play <n>             Play track n");
    println!("  toggle               Pause or resume");
    println!("  next | prev          Move through the queue");
    println!("  stop                 Stop playback");
    println!("  shuffle | repeat     Toggle queue modes");
    println!("  download <n>         Save track n and open it");
    println!("  sermons              Show the sermon list");
    println!("  sermon play <n>      Play or pause sermon n");
    println!("  sermon stop          Stop the sermon");
    println!("  sermon download <n>  Save sermon n and open it");
    println!("  status | meeting     Show player or meeting status");
    println!("  quit\n");
}

fn print_tracks(ctx: &AppContext) {
    let view = ctx.player().snapshot();
    let tracks = ctx.player().tracks();
    if tracks.is_empty() {
        println!("No music yet.");
        return;
    }
    for (index, track) in tracks.iter().enumerate() {
        let marker = if view.active_index == Some(index) { "*" } else { " " };
        let title = if track.title.is_empty() { "Untitled" } else { &track.title };
        if track.artist.is_empty() {
            println!("{} {:>3}. {}", marker, index + 1, title);
        } else {
            println!("{} {:>3}. {} - {}", marker, index + 1, title, track.artist);
        }
    }
}

fn print_sermons(ctx: &AppContext) {
    let sermons = ctx.sermons().sermons();
    if sermons.is_empty() {
        println!("No sermons available yet. Check back soon.");
        return;
    }
    let current = ctx.sermons().current_index();
    for (index, sermon) in sermons.iter().enumerate() {
        let marker = if current == Some(index) { "*" } else { " " };
        let title = if sermon.title.is_empty() { "Sermon" } else { &sermon.title };
        println!("{} {:>3}. {}", marker, index + 1, title);
    }
}

fn print_status(ctx: &AppContext) {
    let view = ctx.player().snapshot();
    match &view.hero {
        Some(track) => {
            let state = if view.is_playing { "Playing" } else { "Paused" };
            println!("{}: {}", state, track.title);
            if view.hero_active {
                println!(
                    "  {} {} / {}",
                    progress_bar(view.progress, 30),
                    format_time(view.position_millis),
                    format_time(view.duration_millis)
                );
            }
        }
        None => println!("Nothing selected."),
    }
    println!(
        "  Shuffle: {}  Repeat: {}",
        if view.shuffle { "on" } else { "off" },
        if view.repeat { "on" } else { "off" }
    );
    if view.music_paused {
        println!("  Music is paused for the meeting.");
    }
    if let Some(error) = &view.link_error {
        println!("  {}", error.message);
    }
    if let Some(error) = &view.playback_error {
        println!("  Playback error: {}", error);
    }
}

fn print_meeting(ctx: &AppContext) {
    let window = ctx.meeting_window();
    println!("{}", window.status_text());
    if window.show_countdown {
        println!("  Starts in {}", format_countdown(window.seconds_until_start));
    }
}

/// Print user-facing events until shutdown
fn spawn_event_printer(event_bus: &EventBus) {
    let (events, _id) = event_bus.subscribe();
    let spawned = thread::Builder::new()
        .name("event-printer".to_string())
        .spawn(move || {
            for event in events.iter() {
                match event {
                    Event::TrackSelected { index, title } => {
                        println!("\n♪ {}. {}", index + 1, title)
                    }
                    Event::LinkRejected { title, message } => println!("\n✗ {}: {}", title, message),
                    Event::PlaybackFailed { message, .. } => {
                        println!("\n✗ Playback failed: {}", message)
                    }
                    Event::MusicPauseChanged { paused: true } => {
                        println!("\nMusic paused for the meeting.")
                    }
                    Event::MusicPauseChanged { paused: false } => println!("\nMusic available."),
                    Event::ExportStatusChanged { status, .. } => {
                        println!("\n{}", status.message())
                    }
                    Event::Shutdown => break,
                    other => tracing::debug!("Event: {}", other.name()),
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("Failed to start event printer: {}", e);
    }
}
