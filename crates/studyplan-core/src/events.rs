//! Change notifications.
//!
//! Every write to the store produces a [`ChangeEvent`]. Front ends register
//! a listener per user with [`ChangeFeed::subscribe`] and stop listening by
//! calling [`Subscription::cancel`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChangeEvent {
    SubjectsChanged {
        subject_id: String,
        at: DateTime<Utc>,
    },
    SubjectDeleted {
        subject_id: String,
        at: DateTime<Utc>,
    },
    ScheduleSaved {
        schedule_id: String,
        date: NaiveDate,
        /// True when an existing schedule for the date was replaced.
        replaced: bool,
        at: DateTime<Utc>,
    },
    SessionRecorded {
        session_id: String,
        subject_id: String,
        at: DateTime<Utc>,
    },
    /// A task of the subject was added, edited or removed.
    TasksChanged {
        subject_id: String,
        task_id: String,
        at: DateTime<Utc>,
    },
    ProfileUpdated {
        onboarding_completed: bool,
        at: DateTime<Utc>,
    },
}

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, (String, Listener)>,
}

/// Per-user fan-out of change events.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<Mutex<Registry>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panicking listener never runs under the lock, so poisoning only
        // means a panic elsewhere; the map itself is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `on_change` for events belonging to `user_id`.
    ///
    /// The listener stays registered until [`Subscription::cancel`] is
    /// called; dropping the handle does not unsubscribe.
    pub fn subscribe<F>(&self, user_id: &str, on_change: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .insert(id, (user_id.to_string(), Arc::new(on_change)));
        tracing::debug!(user_id, subscription = id, "listener subscribed");

        Subscription {
            id,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every listener of `user_id`.
    ///
    /// Listeners run on the caller's thread after the registry lock is
    /// released, so they may subscribe or cancel freely.
    pub fn publish(&self, user_id: &str, event: &ChangeEvent) {
        let targets: Vec<Listener> = self
            .registry()
            .listeners
            .values()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in targets {
            listener(event);
        }
    }

    pub fn listener_count(&self, user_id: &str) -> usize {
        self.registry()
            .listeners
            .values()
            .filter(|(owner, _)| owner == user_id)
            .count()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("listeners", &self.registry().listeners.len())
            .finish()
    }
}

/// Handle returned by [`ChangeFeed::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    feed: std::sync::Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the listener. Returns false if it was already gone.
    pub fn cancel(self) -> bool {
        let Some(inner) = self.feed.upgrade() else {
            return false;
        };
        let mut registry = inner.lock().unwrap_or_else(|e| e.into_inner());
        let removed = registry.listeners.remove(&self.id).is_some();
        tracing::debug!(subscription = self.id, removed, "listener cancelled");
        removed
    }
}
