//! # agent-tracker-core
//!
//! Core library for agent-tracker - a live tracker for coding-agent sessions.
//!
//! This library provides:
//! - Incremental tailing of append-only JSONL files
//! - Watchers for the global events file and per-session transcripts
//! - A transcript parser that turns raw records into display entries
//! - A reducer-based session store with priority ordering and expiry
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows along two independent paths:
//! - **Events:** `sessions.jsonl` → [`SessionEventWatcher`] → [`Action`] →
//!   [`SessionStore::dispatch`] → [`SessionStore::sessions`]
//! - **Transcripts:** `<session>.jsonl` → [`TranscriptWatcher`] (live, no
//!   lookahead) or [`transcript::read_transcript`] (full load) →
//!   [`ParsedTranscriptEntry`]
//!
//! Nothing is persisted; restarting replays the events file from the start.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_tracker_core::{log_errors, Config, SessionEventWatcher, SessionStore};
//! use agent_tracker_core::tail::TailOptions;
//! use std::sync::Arc;
//!
//! let config = Config::load().expect("failed to load config");
//! let store = Arc::new(SessionStore::new(config.tracker.clone()));
//!
//! let watcher = SessionEventWatcher::for_store(
//!     config.events_file(),
//!     TailOptions::events_file(),
//!     store.clone(),
//!     log_errors(),
//! );
//! watcher.start();
//!
//! let counts = store.session_counts();
//! println!("{} sessions, {} awaiting input", counts.total, counts.awaiting_input);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{log_errors, Error, ErrorSink, Result};
pub use events::{Action, SessionEvent};
pub use store::{SessionStore, Subscription};
pub use transcript::{read_transcript, EntryKind, ParsedTranscriptEntry};
pub use types::*;
pub use watcher::{SessionEventWatcher, TranscriptWatcher};

// Public modules
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod store;
pub mod tail;
pub mod transcript;
pub mod types;
pub mod watcher;
