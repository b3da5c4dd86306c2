//! Core domain types for agent-tracker
//!
//! These types are the snapshot the display layer reads: one [`Session`] per
//! tracked agent session, plus the counters and the recent-activity log kept
//! alongside them.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One agent run, identified by the producer-assigned id |
//! | **Status** | Lifecycle position: active, inactive (idle too long) or ended |
//! | **Awaiting input** | Overlay flag: the agent stopped and waits on the human |
//! | **Reactivation** | An ended session receiving new activity and becoming active again |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ============================================
// Session
// ============================================

/// Lifecycle status of a session.
///
/// Ordering of the variants is the display priority used by
/// [`SessionStore::sessions`](crate::store::SessionStore::sessions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Recent activity within the inactivity threshold
    Active,
    /// No activity for longer than the inactivity threshold
    Inactive,
    /// A `session_end` event was received
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Inactive => "inactive",
            SessionStatus::Ended => "ended",
        }
    }

    /// Sort rank: lower sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            SessionStatus::Active => 0,
            SessionStatus::Inactive => 1,
            SessionStatus::Ended => 2,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "inactive" => Ok(SessionStatus::Inactive),
            "ended" => Ok(SessionStatus::Ended),
            _ => Err(format!("unknown session status: {}", s)),
        }
    }
}

/// A tracked agent session.
///
/// `terminal`, `docker` and `git` are carried verbatim from the producing
/// `session_start` event; the tracker never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Producer-assigned identifier
    pub id: String,
    /// Working directory the agent was started in
    pub cwd: Option<String>,
    /// Path to the session's transcript JSONL
    pub transcript_path: Option<PathBuf>,
    /// Terminal metadata (opaque)
    #[serde(default)]
    pub terminal: serde_json::Value,
    /// Container metadata (opaque)
    #[serde(default)]
    pub docker: serde_json::Value,
    /// Git metadata (opaque)
    #[serde(default)]
    pub git: serde_json::Value,

    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
    /// Set if and only if `status == Ended`
    pub end_time: Option<DateTime<Utc>>,

    /// The agent is waiting on the human (independent of `status`)
    pub awaiting_input: bool,
    pub notification_message: Option<String>,

    /// Free text set out-of-band; never affects status
    pub work_summary: Option<String>,
}

impl Session {
    /// Return to `Active` from `Inactive` or `Ended`, clearing any end time.
    pub(crate) fn reactivate(&mut self) {
        self.status = SessionStatus::Active;
        self.end_time = None;
    }
}

/// Aggregate counts over all tracked sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounts {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub ended: usize,
    pub awaiting_input: usize,
}

impl SessionCounts {
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut counts = SessionCounts::default();
        for session in sessions {
            counts.total += 1;
            match session.status {
                SessionStatus::Active => counts.active += 1,
                SessionStatus::Inactive => counts.inactive += 1,
                SessionStatus::Ended => counts.ended += 1,
            }
            if session.awaiting_input {
                counts.awaiting_input += 1;
            }
        }
        counts
    }
}

// ============================================
// Activity
// ============================================

/// Kind of activity reported by the producer hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// The agent invoked a tool
    ToolUse,
    /// The human submitted a prompt
    PromptSubmit,
    /// The agent finished its turn
    Stop,
    /// A subagent finished
    SubagentStop,
    /// The agent raised a notification (usually a permission prompt)
    Notification,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::ToolUse => "tool_use",
            ActivityType::PromptSubmit => "prompt_submit",
            ActivityType::Stop => "stop",
            ActivityType::SubagentStop => "subagent_stop",
            ActivityType::Notification => "notification",
        }
    }

    /// Activities after which the agent waits on the human.
    pub fn sets_awaiting_input(&self) -> bool {
        matches!(self, ActivityType::Stop | ActivityType::Notification)
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the bounded recent-activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub session_id: String,
    pub activity_type: ActivityType,
    pub tool_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Event counters kept by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub total_events: u64,
    /// Keyed by `session_start`, `session_end` or the activity type name
    pub events_by_type: HashMap<String, u64>,
}

impl TrackerStats {
    pub(crate) fn record(&mut self, kind: &str) {
        self.total_events += 1;
        *self.events_by_type.entry(kind.to_string()).or_insert(0) += 1;
    }
}
