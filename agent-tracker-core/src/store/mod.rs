//! Session state store
//!
//! [`SessionStore`] owns a [`TrackerState`] behind a mutex and runs every
//! change through the pure functions in [`reducer`]. Listeners registered
//! with [`SessionStore::subscribe`] are called synchronously after each
//! dispatch, and after any sweep that changed something. They run with the
//! state lock released, so a listener may query the store.
//!
//! ```no_run
//! use agent_tracker_core::config::TrackerConfig;
//! use agent_tracker_core::store::SessionStore;
//!
//! let store = SessionStore::new(TrackerConfig::default());
//! let _sub = store.subscribe(|| println!("sessions changed"));
//! for session in store.sessions() {
//!     println!("{} {}", session.id, session.status);
//! }
//! ```

pub mod reducer;

pub use reducer::{reduce, update_statuses, TrackerState};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::events::Action;
use crate::types::{ActivityRecord, Session, SessionCounts, TrackerStats};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, Listener>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queryable, subscribable session state.
pub struct SessionStore {
    config: TrackerConfig,
    state: Mutex<TrackerState>,
    listeners: Arc<Listeners>,
}

impl SessionStore {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
            listeners: Arc::new(Listeners::default()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Apply one action, then notify every listener.
    pub fn dispatch(&self, action: Action) {
        tracing::debug!(
            kind = action.kind(),
            session_id = action.session_id(),
            "Dispatching action"
        );
        {
            let mut state = lock(&self.state);
            let current = std::mem::take(&mut *state);
            *state = reduce(current, &action, self.config.recent_activity_limit);
        }
        self.notify();
    }

    /// Set the work summary of a known session.
    pub fn set_work_summary(&self, session_id: &str, summary: Option<String>) -> Result<()> {
        if !lock(&self.state).sessions.contains_key(session_id) {
            return Err(Error::SessionNotFound(session_id.to_string()));
        }
        self.dispatch(Action::UpdateWorkSummary {
            session_id: session_id.to_string(),
            summary,
        });
        Ok(())
    }

    /// All sessions, those needing attention first.
    ///
    /// Ordered by awaiting input (true first), then status rank, then most
    /// recent activity.
    pub fn sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = lock(&self.state).sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.awaiting_input
                .cmp(&a.awaiting_input)
                .then_with(|| a.status.rank().cmp(&b.status.rank()))
                .then_with(|| b.last_activity_time.cmp(&a.last_activity_time))
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        lock(&self.state).sessions.get(session_id).cloned()
    }

    pub fn session_counts(&self) -> SessionCounts {
        SessionCounts::from_sessions(lock(&self.state).sessions.values())
    }

    /// Recent activity, newest last.
    pub fn recent_activity(&self) -> Vec<ActivityRecord> {
        lock(&self.state).recent_activity.iter().cloned().collect()
    }

    pub fn stats(&self) -> TrackerStats {
        lock(&self.state).stats.clone()
    }

    /// Run the periodic sweep against the current time.
    ///
    /// Returns whether any session changed status or was removed.
    pub fn update_session_statuses(&self) -> bool {
        self.update_session_statuses_at(Utc::now())
    }

    /// Run the periodic sweep as of `now`.
    pub fn update_session_statuses_at(&self, now: DateTime<Utc>) -> bool {
        let changed = {
            let mut state = lock(&self.state);
            let current = std::mem::take(&mut *state);
            let (next, changed) = update_statuses(current, now, &self.config);
            *state = next;
            changed
        };
        if changed {
            self.notify();
        }
        changed
    }

    /// Register a change listener.
    ///
    /// The listener stays registered until [`Subscription::unsubscribe`] is
    /// called or the subscription is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners.entries).insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners.entries).len()
    }

    fn notify(&self) {
        // Snapshot so listeners may subscribe or unsubscribe while running
        let listeners: Vec<Listener> = lock(&self.listeners.entries).values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &lock(&self.state).sessions.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle returned by [`SessionStore::subscribe`].
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Remove the listener. Safe to call after the store is gone.
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn remove(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners.entries).remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
