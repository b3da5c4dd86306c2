//! agent-tracker - headless harness for the session tracking engine
//!
//! Drives the core watchers and store from the command line and prints JSON,
//! for debugging producers and transcripts without the dashboard.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/agent-tracker/agent-tracker.log
//! - Config: $XDG_CONFIG_HOME/agent-tracker/config.toml

mod snapshot;

use agent_tracker_core::tail::TailOptions;
use agent_tracker_core::transcript::read_transcript;
use agent_tracker_core::{
    Config, Error, ErrorSink, ParsedTranscriptEntry, SessionEventWatcher, SessionStore,
    TranscriptWatcher,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snapshot::Snapshot;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the main loop wakes to check for changes and shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "agent-tracker")]
#[command(about = "Track coding-agent sessions from their event and transcript logs")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay the events file once and print the resulting sessions
    Sessions {
        /// Events file (defaults to config, then ~/.agent-tracker/sessions.jsonl)
        #[arg(long)]
        events_file: Option<PathBuf>,

        /// Run the idle/expiry sweep against the current time before printing
        #[arg(long)]
        sweep: bool,
    },

    /// Follow the events file, printing a snapshot line whenever sessions change
    Watch {
        /// Events file (defaults to config, then ~/.agent-tracker/sessions.jsonl)
        #[arg(long)]
        events_file: Option<PathBuf>,

        /// Exit after this many milliseconds instead of waiting for Ctrl+C
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Parse a transcript file and print its entries
    Transcript {
        /// Transcript JSONL file
        path: PathBuf,

        /// Keep following the file and print new entries as they arrive
        #[arg(short, long)]
        follow: bool,

        /// Exit after this many milliseconds (only with --follow)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file; stdout carries JSON)
    let _log_guard =
        agent_tracker_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match args.command {
        Command::Sessions { events_file, sweep } => run_sessions(&config, events_file, sweep),
        Command::Watch {
            events_file,
            timeout_ms,
        } => run_watch(&config, events_file, timeout_ms),
        Command::Transcript {
            path,
            follow,
            timeout_ms,
        } => run_transcript(&config, path, follow, timeout_ms),
    }
}

fn stderr_errors() -> ErrorSink {
    Arc::new(|e: &Error| {
        tracing::warn!(error = %e, "ingestion error");
        eprintln!("warning: {}", e);
    })
}

/// Flag cleared by Ctrl+C.
fn install_shutdown_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;
    Ok(running)
}

fn print_json_line<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value).context("failed to serialize output")?;
    writeln!(stdout).context("failed to write output")?;
    stdout.flush().context("failed to flush output")?;
    Ok(())
}

fn run_sessions(config: &Config, events_file: Option<PathBuf>, sweep: bool) -> Result<()> {
    let path = events_file.unwrap_or_else(|| config.events_file());
    tracing::info!(path = %path.display(), "Replaying events file");

    let store = Arc::new(SessionStore::new(config.tracker.clone()));
    let watcher = SessionEventWatcher::for_store(
        &path,
        TailOptions::events_file().without_watch(),
        store.clone(),
        stderr_errors(),
    );
    watcher.start();
    watcher.stop();

    if sweep && store.update_session_statuses() {
        tracing::debug!("Status sweep changed sessions");
    }

    let snapshot = Snapshot::capture(&store);
    let rendered =
        serde_json::to_string_pretty(&snapshot).context("failed to serialize snapshot")?;
    println!("{}", rendered);
    Ok(())
}

fn run_watch(config: &Config, events_file: Option<PathBuf>, timeout_ms: Option<u64>) -> Result<()> {
    let path = events_file.unwrap_or_else(|| config.events_file());
    let running = install_shutdown_flag()?;
    let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

    let store = Arc::new(SessionStore::new(config.tracker.clone()));

    // Listeners only mark the store dirty; the loop below prints at most one
    // snapshot per poll
    let dirty = Arc::new(AtomicBool::new(true));
    let d = dirty.clone();
    let _subscription = store.subscribe(move || d.store(true, Ordering::SeqCst));

    let watcher = SessionEventWatcher::for_store(
        &path,
        TailOptions::events_file(),
        store.clone(),
        stderr_errors(),
    );
    watcher.start();

    eprintln!("Watching {} (Ctrl+C to stop)", path.display());
    tracing::info!(path = %path.display(), "Watch mode started");

    let sweep_interval = config.tracker.status_interval();
    let mut last_sweep = Instant::now();

    while running.load(Ordering::SeqCst) {
        if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
            break;
        }

        if last_sweep.elapsed() >= sweep_interval {
            if store.update_session_statuses() {
                tracing::debug!("Status sweep changed sessions");
            }
            last_sweep = Instant::now();
        }

        if dirty.swap(false, Ordering::SeqCst) {
            print_json_line(&Snapshot::capture(&store))?;
        }

        thread::sleep(POLL_INTERVAL);
    }

    watcher.stop();
    tracing::info!("Watch mode stopped");
    Ok(())
}

fn run_transcript(
    config: &Config,
    path: PathBuf,
    follow: bool,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let entries = read_transcript(&path)
        .with_context(|| format!("failed to read transcript {}", path.display()))?;

    if !follow {
        let rendered =
            serde_json::to_string_pretty(&entries).context("failed to serialize entries")?;
        println!("{}", rendered);
        return Ok(());
    }

    for entry in &entries {
        print_json_line(entry)?;
    }

    let running = install_shutdown_flag()?;
    let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

    let on_entries = Arc::new(|batch: Vec<ParsedTranscriptEntry>| {
        for entry in &batch {
            if let Err(e) = print_json_line(entry) {
                tracing::warn!(error = %e, "Failed to print transcript entry");
            }
        }
    });
    let watcher = TranscriptWatcher::new(
        &path,
        config.tracker.transcript_retry_interval(),
        on_entries,
        stderr_errors(),
    );
    watcher.start();

    eprintln!("Following {} (Ctrl+C to stop)", path.display());

    while running.load(Ordering::SeqCst) {
        if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    watcher.stop();
    Ok(())
}
