//! Hardpoint game-master binary.
//!
//! Wires the session engine to a console chat platform: commands are read
//! from stdin, announcements are printed to stdout, and the drain loop
//! runs until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `hardpoint-config.yaml` (or `HARDPOINT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load and validate game data
//! 4. Build the session document and state machine
//! 5. Start the announcement pump
//! 6. Create the dispatcher and the voice listener
//! 7. Start reading console input
//! 8. Run the drain loop until Ctrl-C
//! 9. Stop background tasks and log the result

mod console;
mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hardpoint_core::announce::{self, Announcer};
use hardpoint_core::chat::ChatClient;
use hardpoint_core::config::{GameData, HardpointConfig};
use hardpoint_core::dispatch::Dispatcher;
use hardpoint_core::machine::StateMachine;
use hardpoint_core::session::SessionDocument;
use hardpoint_core::speech::SpeechClient;
use hardpoint_core::table::TransitionTable;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::{ConsoleChat, ConsoleSpeech, parse_line};
use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, game data or the transition table
/// cannot be loaded.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("hardpoint-engine starting");
    info!(
        config = %config_path.display(),
        drain_period_ms = config.engine.drain_period_ms,
        async_timeout_ms = config.engine.async_timeout_ms,
        time_limit_secs = config.game.time_limit_secs,
        rotation_secs = config.game.rotation_secs,
        "Configuration loaded"
    );

    // 3. Load game data.
    let data = GameData::from_file(&config.data.game_data_path).map_err(EngineError::from)?;
    info!(
        path = %config.data.game_data_path.display(),
        hardpoints = data.hardpoint_names.len(),
        spawn_points = data.spawn_point_names.len(),
        "Game data loaded"
    );

    // 4. Build the session document and state machine.
    let document = SessionDocument::new(config.session_defaults(data));
    let mut machine = StateMachine::new(
        "hardpoint",
        TransitionTable::standard(),
        document,
        Duration::from_millis(config.engine.async_timeout_ms),
    )
    .map_err(EngineError::from)?;

    // 5. Start the announcement pump.
    let console = Arc::new(ConsoleChat::new(&config.chat));
    let chat: Arc<dyn ChatClient> = console.clone();
    let speech: Arc<dyn SpeechClient> = Arc::new(ConsoleSpeech);
    let (announcer, announcements) = Announcer::channel();
    let pump = tokio::spawn(announce::deliver(
        announcements,
        Arc::clone(&chat),
        Some(Arc::clone(&speech)),
    ));

    // 6. Create the dispatcher and the voice listener.
    let (voice_sink, clips) = mpsc::unbounded_channel();
    let dispatcher = Arc::new(Dispatcher::new(
        machine.sender(),
        announcer,
        chat,
        Some(speech),
        voice_sink,
    ));
    let listener = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.listen(clips).await })
    };

    // 7. Start reading console input.
    let reader = tokio::spawn(read_console(
        Arc::clone(&console),
        Arc::clone(&dispatcher),
        config.chat.command_prefix.clone(),
    ));
    info!(
        prefix = %config.chat.command_prefix,
        "Ready, type {}help for commands",
        config.chat.command_prefix
    );

    // 8. Run the drain loop.
    let summary = machine
        .run(
            Duration::from_millis(config.engine.drain_period_ms),
            shutdown_signal(),
        )
        .await;

    // 9. Stop background tasks.
    reader.abort();
    listener.abort();
    drop(dispatcher);
    drop(machine);
    if tokio::time::timeout(Duration::from_secs(1), pump).await.is_err() {
        debug!("Announcement pump did not drain in time");
    }

    info!(
        drains = summary.drains,
        processed = summary.processed,
        committed = summary.committed,
        failed = summary.failed,
        "hardpoint-engine shutdown complete"
    );
    Ok(())
}

/// Load configuration from `HARDPOINT_CONFIG` or `hardpoint-config.yaml`.
///
/// A missing file means defaults; a malformed one is an error.
fn load_config() -> Result<(HardpointConfig, PathBuf), EngineError> {
    let path = std::env::var("HARDPOINT_CONFIG")
        .map_or_else(|_| PathBuf::from("hardpoint-config.yaml"), PathBuf::from);
    if path.exists() {
        let config = HardpointConfig::from_file(&path)?;
        Ok((config, path))
    } else {
        let mut config = HardpointConfig::default();
        config.data.apply_env_overrides();
        Ok((config, path))
    }
}

/// Feed stdin lines to the dispatcher until input closes.
async fn read_console(console: Arc<ConsoleChat>, dispatcher: Arc<Dispatcher>, prefix: String) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let origin = console.origin();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read console input");
                break;
            }
        };

        if let Some(words) = line.trim().strip_prefix("say ") {
            if !console.speak(words).await {
                warn!("Not in a voice channel, attach one first");
            }
            continue;
        }
        match parse_line(&prefix, &line) {
            Some(Ok(message)) => {
                dispatcher.handle_message(&origin, &message);
            }
            Some(Err(e)) => warn!(error = %e, "Ignoring console line"),
            None => debug!(line = %line, "Not a command"),
        }
    }
    info!("Console input closed, press Ctrl-C to stop");
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
        return;
    }
    info!("Ctrl-C received, shutting down");
}
