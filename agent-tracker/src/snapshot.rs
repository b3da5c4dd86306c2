//! JSON view of the store printed by `sessions` and `watch`

use agent_tracker_core::{ActivityRecord, Session, SessionCounts, SessionStore, TrackerStats};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Recent activity records included in each snapshot
const RECENT_ACTIVITY_SHOWN: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub counts: SessionCounts,
    /// Display order: needs attention first
    pub sessions: Vec<Session>,
    /// Newest first
    pub recent_activity: Vec<ActivityRecord>,
    pub stats: TrackerStats,
}

impl Snapshot {
    pub fn capture(store: &SessionStore) -> Self {
        let mut recent_activity = store.recent_activity();
        recent_activity.reverse();
        recent_activity.truncate(RECENT_ACTIVITY_SHOWN);

        Self {
            generated_at: Utc::now(),
            counts: store.session_counts(),
            sessions: store.sessions(),
            recent_activity,
            stats: store.stats(),
        }
    }
}
