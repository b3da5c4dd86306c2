//! Producer event records and the store actions derived from them
//!
//! Each line of `sessions.jsonl` is one JSON object discriminated by
//! `event_type`. Unknown extra fields are ignored; a line that does not fit
//! any of the three shapes is a parse error for that line only.
//!
//! ```text
//! {"event_type":"session_start","session_id":"abc","timestamp":"2025-01-01T10:00:00Z","cwd":"/src/app",...}
//! {"event_type":"activity","session_id":"abc","timestamp":"...","activity_type":"tool_use","tool_name":"Bash"}
//! {"event_type":"session_end","session_id":"abc","timestamp":"..."}
//! ```

use crate::types::ActivityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One record of the events file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStart(SessionStartEvent),
    SessionEnd(SessionEndEvent),
    Activity(ActivityEvent),
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::SessionStart(e) => &e.session_id,
            SessionEvent::SessionEnd(e) => &e.session_id,
            SessionEvent::Activity(e) => &e.session_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    #[serde(default)]
    pub terminal: serde_json::Value,
    #[serde(default)]
    pub docker: serde_json::Value,
    #[serde(default)]
    pub git: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEndEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub terminal: serde_json::Value,
    #[serde(default)]
    pub docker: serde_json::Value,
    #[serde(default)]
    pub git: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default)]
    pub notification_message: Option<String>,
}

/// Parse one line of the events file.
pub fn parse_event_line(line: &str) -> serde_json::Result<SessionEvent> {
    serde_json::from_str(line)
}

// ============================================
// Store actions
// ============================================

/// Reducer input for [`SessionStore`](crate::store::SessionStore).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SessionStart(SessionStartEvent),
    SessionEnd(SessionEndEvent),
    ActivityToolUse(ActivityEvent),
    ActivityPromptSubmit(ActivityEvent),
    ActivityStop(ActivityEvent),
    ActivitySubagentStop(ActivityEvent),
    ActivityNotification(ActivityEvent),
    /// Set out-of-band; does not touch status or awaiting fields
    UpdateWorkSummary {
        session_id: String,
        summary: Option<String>,
    },
}

impl Action {
    /// Stable name used for stats and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SessionStart(_) => "session_start",
            Action::SessionEnd(_) => "session_end",
            Action::ActivityToolUse(e)
            | Action::ActivityPromptSubmit(e)
            | Action::ActivityStop(e)
            | Action::ActivitySubagentStop(e)
            | Action::ActivityNotification(e) => e.activity_type.as_str(),
            Action::UpdateWorkSummary { .. } => "update_work_summary",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Action::SessionStart(e) => &e.session_id,
            Action::SessionEnd(e) => &e.session_id,
            Action::ActivityToolUse(e)
            | Action::ActivityPromptSubmit(e)
            | Action::ActivityStop(e)
            | Action::ActivitySubagentStop(e)
            | Action::ActivityNotification(e) => &e.session_id,
            Action::UpdateWorkSummary { session_id, .. } => session_id,
        }
    }

    /// The activity payload, for the five activity actions.
    pub fn activity(&self) -> Option<&ActivityEvent> {
        match self {
            Action::ActivityToolUse(e)
            | Action::ActivityPromptSubmit(e)
            | Action::ActivityStop(e)
            | Action::ActivitySubagentStop(e)
            | Action::ActivityNotification(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ActivityEvent> for Action {
    fn from(event: ActivityEvent) -> Self {
        match event.activity_type {
            ActivityType::ToolUse => Action::ActivityToolUse(event),
            ActivityType::PromptSubmit => Action::ActivityPromptSubmit(event),
            ActivityType::Stop => Action::ActivityStop(event),
            ActivityType::SubagentStop => Action::ActivitySubagentStop(event),
            ActivityType::Notification => Action::ActivityNotification(event),
        }
    }
}

impl From<SessionEvent> for Action {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::SessionStart(e) => Action::SessionStart(e),
            SessionEvent::SessionEnd(e) => Action::SessionEnd(e),
            SessionEvent::Activity(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_start_with_metadata() {
        let line = r#"{"event_type":"session_start","session_id":"abc","timestamp":"2025-01-01T10:00:00Z","cwd":"/src/app","transcript_path":"/tmp/t.jsonl","terminal":{"tty":"/dev/ttys003"},"git":{"branch":"main"},"hostname":"box"}"#;
        let event = parse_event_line(line).unwrap();

        match event {
            SessionEvent::SessionStart(start) => {
                assert_eq!(start.session_id, "abc");
                assert_eq!(start.cwd.as_deref(), Some("/src/app"));
                assert_eq!(start.transcript_path, Some(PathBuf::from("/tmp/t.jsonl")));
                assert_eq!(start.terminal["tty"], "/dev/ttys003");
                assert_eq!(start.git["branch"], "main");
                assert!(start.docker.is_null());
            }
            other => panic!("expected session_start, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_activity_to_action() {
        let line = r#"{"event_type":"activity","session_id":"abc","timestamp":"2025-01-01T10:00:05.123Z","activity_type":"notification","notification_message":"Claude needs your permission"}"#;
        let action: Action = parse_event_line(line).unwrap().into();

        assert_eq!(action.kind(), "notification");
        assert_eq!(action.session_id(), "abc");
        match action {
            Action::ActivityNotification(e) => {
                assert_eq!(
                    e.notification_message.as_deref(),
                    Some("Claude needs your permission")
                );
            }
            other => panic!("expected notification action, got {:?}", other),
        }
    }

    #[test]
    fn test_each_activity_type_maps_to_action() {
        for (name, kind) in [
            ("tool_use", "tool_use"),
            ("prompt_submit", "prompt_submit"),
            ("stop", "stop"),
            ("subagent_stop", "subagent_stop"),
            ("notification", "notification"),
        ] {
            let line = format!(
                r#"{{"event_type":"activity","session_id":"s","timestamp":"2025-01-01T00:00:00Z","activity_type":"{}"}}"#,
                name
            );
            let action: Action = parse_event_line(&line).unwrap().into();
            assert_eq!(action.kind(), kind);
            assert!(action.activity().is_some());
        }
    }

    #[test]
    fn test_unknown_event_type_is_error() {
        let line = r#"{"event_type":"heartbeat","session_id":"s","timestamp":"2025-01-01T00:00:00Z"}"#;
        assert!(parse_event_line(line).is_err());
    }

    #[test]
    fn test_missing_timestamp_is_error() {
        let line = r#"{"event_type":"session_end","session_id":"s"}"#;
        assert!(parse_event_line(line).is_err());
    }
}
