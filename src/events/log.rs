//! Append-only, totally-ordered log of domain events.
//!
//! This is the single source of truth the planner reads: it never interprets
//! the log itself, it is told to re-derive readiness from a snapshot of it.
//! A single mutex protects append and snapshot; only the execution manager's
//! workers ever append, which keeps the locking story trivial (mirrors the
//! single-mutex-guarded state pattern used by the ambient stack elsewhere).

use parking_lot::Mutex;

use super::event::TaskEvent;

/// Thread-safe, append-only sequence of [`TaskEvent`]s for a single task run.
pub struct EventLog {
    events: Mutex<Vec<TaskEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Append an event to the end of the log.
    pub fn post(&self, event: TaskEvent) {
        self.events.lock().push(event);
    }

    /// An ordered snapshot of every event posted so far.
    pub fn snapshot(&self) -> Vec<TaskEvent> {
        self.events.lock().clone()
    }

    /// The number of events posted so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Filter a snapshot down to the events for which `predicate` holds,
    /// preserving posting order. Named `filter` rather than a generic
    /// variant-typed method because Rust enums do not carry a "kind"
    /// type parameter the way the abstract spec's `filter<T>()` implies;
    /// callers match on the variant inside `predicate` instead.
    pub fn filter<F>(&self, predicate: F) -> Vec<TaskEvent>
    where
        F: Fn(&TaskEvent) -> bool,
    {
        self.events
            .lock()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
