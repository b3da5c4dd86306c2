//! Pure state transitions for the session store
//!
//! [`reduce`] and [`update_statuses`] take the state by value and return the
//! next state. Neither touches the clock, the filesystem or any listener; the
//! [`SessionStore`](super::SessionStore) wraps them with locking and
//! notification.

use crate::config::TrackerConfig;
use crate::events::{Action, ActivityEvent, SessionEndEvent, SessionStartEvent};
use crate::types::{ActivityRecord, ActivityType, Session, SessionStatus, TrackerStats};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

/// Message shown when the agent finishes its turn without saying why.
pub const DEFAULT_STOP_MESSAGE: &str = "Waiting for your input";
/// Message shown for a notification that carries no text.
pub const DEFAULT_NOTIFICATION_MESSAGE: &str = "Needs your attention";

/// Everything the store knows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    pub sessions: HashMap<String, Session>,
    /// Newest last; capped at the configured limit
    pub recent_activity: VecDeque<ActivityRecord>,
    pub stats: TrackerStats,
}

/// Apply one action.
///
/// `activity_limit` bounds `recent_activity`; the oldest records are evicted
/// first.
pub fn reduce(mut state: TrackerState, action: &Action, activity_limit: usize) -> TrackerState {
    if !matches!(action, Action::UpdateWorkSummary { .. }) {
        state.stats.record(action.kind());
    }

    match action {
        Action::SessionStart(event) => start_session(&mut state, event),
        Action::SessionEnd(event) => end_session(&mut state, event),
        Action::UpdateWorkSummary {
            session_id,
            summary,
        } => match state.sessions.get_mut(session_id) {
            Some(session) => session.work_summary = summary.clone(),
            None => tracing::debug!(session_id = %session_id, "Work summary for unknown session"),
        },
        Action::ActivityToolUse(event)
        | Action::ActivityPromptSubmit(event)
        | Action::ActivityStop(event)
        | Action::ActivitySubagentStop(event)
        | Action::ActivityNotification(event) => {
            if apply_activity(&mut state, event) {
                state.recent_activity.push_back(ActivityRecord {
                    session_id: event.session_id.clone(),
                    activity_type: event.activity_type,
                    tool_name: event.tool_name.clone(),
                    timestamp: event.timestamp,
                });
                while state.recent_activity.len() > activity_limit {
                    state.recent_activity.pop_front();
                }
            }
        }
    }

    state
}

fn start_session(state: &mut TrackerState, event: &SessionStartEvent) {
    let session = Session {
        id: event.session_id.clone(),
        cwd: event.cwd.clone(),
        transcript_path: event.transcript_path.clone(),
        terminal: event.terminal.clone(),
        docker: event.docker.clone(),
        git: event.git.clone(),
        status: SessionStatus::Active,
        start_time: event.timestamp,
        last_activity_time: event.timestamp,
        end_time: None,
        awaiting_input: false,
        notification_message: None,
        work_summary: None,
    };
    if state.sessions.insert(session.id.clone(), session).is_some() {
        tracing::debug!(session_id = %event.session_id, "Session restarted");
    }
}

fn end_session(state: &mut TrackerState, event: &SessionEndEvent) {
    match state.sessions.get_mut(&event.session_id) {
        Some(session) => {
            session.status = SessionStatus::Ended;
            session.end_time = Some(event.timestamp);
        }
        None => {
            tracing::debug!(session_id = %event.session_id, "Dropping end for unknown session");
        }
    }
}

/// Returns false when the session is unknown.
fn apply_activity(state: &mut TrackerState, event: &ActivityEvent) -> bool {
    let Some(session) = state.sessions.get_mut(&event.session_id) else {
        tracing::debug!(
            session_id = %event.session_id,
            activity = %event.activity_type,
            "Dropping activity for unknown session"
        );
        return false;
    };

    session.reactivate();
    session.last_activity_time = event.timestamp;

    if event.activity_type.sets_awaiting_input() {
        let fallback = match event.activity_type {
            ActivityType::Notification => DEFAULT_NOTIFICATION_MESSAGE,
            _ => DEFAULT_STOP_MESSAGE,
        };
        session.awaiting_input = true;
        session.notification_message = Some(
            event
                .notification_message
                .clone()
                .unwrap_or_else(|| fallback.to_string()),
        );
    } else {
        session.awaiting_input = false;
        session.notification_message = None;
    }
    true
}

/// Periodic sweep: idle detection and removal of long-ended sessions.
///
/// Returns the next state and whether anything changed.
pub fn update_statuses(
    mut state: TrackerState,
    now: DateTime<Utc>,
    config: &TrackerConfig,
) -> (TrackerState, bool) {
    let inactive_after = millis(config.inactive_threshold_ms);
    let remove_after = millis(config.remove_ended_sessions_ms);
    let mut changed = false;

    for session in state.sessions.values_mut() {
        let idle = now - session.last_activity_time;
        let next = match session.status {
            SessionStatus::Active if idle > inactive_after => SessionStatus::Inactive,
            SessionStatus::Inactive if idle <= inactive_after => SessionStatus::Active,
            status => status,
        };
        if next != session.status {
            tracing::debug!(
                session_id = %session.id,
                from = %session.status,
                to = %next,
                "Session status changed"
            );
            session.status = next;
            changed = true;
        }
    }

    let before = state.sessions.len();
    state.sessions.retain(|id, session| {
        let expired = session.status == SessionStatus::Ended
            && session
                .end_time
                .map(|end| now - end > remove_after)
                .unwrap_or(false);
        if expired {
            tracing::debug!(session_id = %id, "Removing ended session");
        }
        !expired
    });
    changed |= state.sessions.len() != before;

    (state, changed)
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}
