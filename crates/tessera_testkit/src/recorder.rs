//! Recording changes.

use parking_lot::Mutex;
use std::sync::Arc;
use tessera_core::{Change, FnChange};

/// Outcome delivered to a recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The named change was committed.
    Committed(String),
    /// The named change was rolled back.
    RolledBack(String),
}

/// Hands out named changes and logs what happens to them, in order.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct ChangeRecorder {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl ChangeRecorder {
    /// Creates a recorder with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a change that logs `name` when it is committed or rolled back.
    pub fn change(&self, name: impl Into<String>) -> Box<dyn Change> {
        let name = name.into();
        let commit_log = Arc::clone(&self.events);
        let rollback_log = Arc::clone(&self.events);
        let commit_name = name.clone();
        Box::new(FnChange::new(
            move || commit_log.lock().push(ChangeEvent::Committed(commit_name)),
            move || rollback_log.lock().push(ChangeEvent::RolledBack(name)),
        ))
    }

    /// Every event so far.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    /// Names of committed changes, in commit order.
    pub fn committed(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ChangeEvent::Committed(name) => Some(name.clone()),
                ChangeEvent::RolledBack(_) => None,
            })
            .collect()
    }

    /// Names of rolled back changes, in rollback order.
    pub fn rolled_back(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ChangeEvent::RolledBack(name) => Some(name.clone()),
                ChangeEvent::Committed(_) => None,
            })
            .collect()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
