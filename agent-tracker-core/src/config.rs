//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/agent-tracker/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/agent-tracker/` (~/.config/agent-tracker/)
//! - State/Logs: `$XDG_STATE_HOME/agent-tracker/` (~/.local/state/agent-tracker/)
//!
//! The events file itself lives where the hook producer writes it,
//! `~/.agent-tracker/sessions.jsonl` unless overridden.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Expand a leading `~/` against the home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// File location overrides
    #[serde(default)]
    pub paths: PathOverrides,

    /// Session status machine tuning
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Override paths for watched files
#[derive(Debug, Deserialize, Default)]
pub struct PathOverrides {
    /// Override path for the global events file
    pub events_file: Option<PathBuf>,
}

/// Timing and sizing knobs for the session store and watchers
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Milliseconds without activity before an active session turns inactive
    #[serde(default = "default_inactive_threshold_ms")]
    pub inactive_threshold_ms: u64,

    /// Milliseconds an ended session stays visible before removal
    #[serde(default = "default_remove_ended_sessions_ms")]
    pub remove_ended_sessions_ms: u64,

    /// How often the host should call `update_session_statuses`
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Maximum entries kept in the recent-activity log
    #[serde(default = "default_recent_activity_limit")]
    pub recent_activity_limit: usize,

    /// Poll interval while waiting for a transcript file to be created
    #[serde(default = "default_transcript_retry_ms")]
    pub transcript_retry_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            inactive_threshold_ms: default_inactive_threshold_ms(),
            remove_ended_sessions_ms: default_remove_ended_sessions_ms(),
            status_interval_ms: default_status_interval_ms(),
            recent_activity_limit: default_recent_activity_limit(),
            transcript_retry_ms: default_transcript_retry_ms(),
        }
    }
}

impl TrackerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.inactive_threshold_ms == 0 {
            return Err(Error::Config(
                "tracker.inactive_threshold_ms must be greater than 0".to_string(),
            ));
        }
        if self.remove_ended_sessions_ms == 0 {
            return Err(Error::Config(
                "tracker.remove_ended_sessions_ms must be greater than 0".to_string(),
            ));
        }
        if self.status_interval_ms == 0 {
            return Err(Error::Config(
                "tracker.status_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.transcript_retry_ms == 0 {
            return Err(Error::Config(
                "tracker.transcript_retry_ms must be greater than 0".to_string(),
            ));
        }
        if self.recent_activity_limit == 0 {
            return Err(Error::Config(
                "tracker.recent_activity_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn transcript_retry_interval(&self) -> Duration {
        Duration::from_millis(self.transcript_retry_ms)
    }
}

fn default_inactive_threshold_ms() -> u64 {
    5 * 60 * 1000
}

fn default_remove_ended_sessions_ms() -> u64 {
    30 * 60 * 1000
}

fn default_status_interval_ms() -> u64 {
    10_000
}

fn default_recent_activity_limit() -> usize {
    100
}

fn default_transcript_retry_ms() -> u64 {
    2_000
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.tracker.validate()?;
        Ok(config)
    }

    /// Resolved events file: the configured override or the default location.
    pub fn events_file(&self) -> PathBuf {
        self.paths
            .events_file
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(Self::default_events_file)
    }

    /// `~/.agent-tracker/sessions.jsonl`
    pub fn default_events_file() -> PathBuf {
        home_dir().join(".agent-tracker").join("sessions.jsonl")
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/agent-tracker/config.toml` (~/.config/agent-tracker/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("agent-tracker").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/agent-tracker/` (~/.local/state/agent-tracker/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("agent-tracker")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("agent-tracker.log")
    }
}
