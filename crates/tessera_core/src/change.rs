//! In-memory side effects tied to a unit of work's outcome.
//!
//! A [`Change`] keeps non-persisted state (caches, in-memory indexes) in step
//! with the store. The recovery unit commits registered changes in
//! registration order after its batch is applied, and rolls them back in
//! reverse order when the unit of work is abandoned.

use std::fmt;

/// A side effect with paired commit and rollback actions.
///
/// Both receivers consume the change, so exactly one of them runs, once.
pub trait Change: Send {
    /// Called after the unit of work committed.
    fn commit(self: Box<Self>);

    /// Called when the unit of work is aborted.
    fn rollback(self: Box<Self>);
}

fn noop() {}

/// A [`Change`] built from two closures.
pub struct FnChange<C, R> {
    on_commit: C,
    on_rollback: R,
}

impl<C, R> FnChange<C, R>
where
    C: FnOnce() + Send,
    R: FnOnce() + Send,
{
    /// Creates a change running `on_commit` or `on_rollback`.
    pub fn new(on_commit: C, on_rollback: R) -> Self {
        Self {
            on_commit,
            on_rollback,
        }
    }
}

impl<C, R> Change for FnChange<C, R>
where
    C: FnOnce() + Send,
    R: FnOnce() + Send,
{
    fn commit(self: Box<Self>) {
        (self.on_commit)();
    }

    fn rollback(self: Box<Self>) {
        (self.on_rollback)();
    }
}

/// A change that only acts on commit.
pub fn on_commit<F>(f: F) -> FnChange<F, fn()>
where
    F: FnOnce() + Send,
{
    FnChange::new(f, noop as fn())
}

/// A change that only acts on rollback.
pub fn on_rollback<F>(f: F) -> FnChange<fn(), F>
where
    F: FnOnce() + Send,
{
    FnChange::new(noop as fn(), f)
}

/// Ordered list of registered changes.
#[derive(Default)]
pub struct ChangeList {
    changes: Vec<Box<dyn Change>>,
}

impl ChangeList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn register(&mut self, change: Box<dyn Change>) {
        self.changes.push(change);
    }

    /// Commits every change in registration order and empties the list.
    pub fn commit_all(&mut self) {
        for change in self.changes.drain(..) {
            change.commit();
        }
    }

    /// Rolls back every change in reverse registration order and empties the list.
    pub fn rollback_all(&mut self) {
        for change in self.changes.drain(..).rev() {
            change.rollback();
        }
    }

    /// Number of registered changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if no change is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl fmt::Debug for ChangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeList")
            .field("len", &self.changes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn logging(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Box<dyn Change> {
        let on_commit = Arc::clone(log);
        let on_rollback = Arc::clone(log);
        Box::new(FnChange::new(
            move || on_commit.lock().push(format!("commit {name}")),
            move || on_rollback.lock().push(format!("rollback {name}")),
        ))
    }

    #[test]
    fn commit_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut list = ChangeList::new();
        list.register(logging(&log, "a"));
        list.register(logging(&log, "b"));
        list.register(logging(&log, "c"));

        list.commit_all();
        assert!(list.is_empty());
        assert_eq!(*log.lock(), vec!["commit a", "commit b", "commit c"]);
    }

    #[test]
    fn rollback_runs_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut list = ChangeList::new();
        list.register(logging(&log, "a"));
        list.register(logging(&log, "b"));
        list.register(logging(&log, "c"));
        assert_eq!(list.len(), 3);

        list.rollback_all();
        assert!(list.is_empty());
        assert_eq!(*log.lock(), vec!["rollback c", "rollback b", "rollback a"]);
    }

    #[test]
    fn drained_list_does_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut list = ChangeList::new();
        list.register(logging(&log, "a"));
        list.commit_all();
        list.rollback_all();
        assert_eq!(*log.lock(), vec!["commit a"]);
    }

    #[test]
    fn one_sided_helpers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut list = ChangeList::new();
        let committed = Arc::clone(&log);
        let rolled_back = Arc::clone(&log);
        list.register(Box::new(on_commit(move || committed.lock().push("c"))));
        list.register(Box::new(on_rollback(move || rolled_back.lock().push("r"))));

        list.rollback_all();
        assert_eq!(*log.lock(), vec!["r"]);
    }
}
