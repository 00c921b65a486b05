//! Recovery units: per-operation transaction contexts.
//!
//! A recovery unit gives one operation a consistent snapshot view of the
//! store, buffers its writes until commit and collects the in-memory
//! [`Change`]s that must follow the transaction's outcome.
//!
//! Units of work nest. Only the outermost scope has physical effects:
//!
//! ```text
//! begin (depth 1) ─ begin (depth 2) ─ commit (no-op) ─ end (depth 1) ─ commit (physical) ─ end (depth 0)
//! ```
//!
//! Ending the outermost scope without committing aborts, and so does
//! dropping the unit.

mod kv;
mod noop;

pub use kv::KvRecoveryUnit;
pub use noop::NoopRecoveryUnit;

use crate::change::Change;
use crate::error::CoreResult;
use crate::types::RecordId;
use std::ops::{Deref, DerefMut};

/// Lifecycle surface shared by every kind of recovery unit.
pub trait RecoveryUnit: Send {
    /// Opens a (possibly nested) unit of work.
    fn begin_unit_of_work(&mut self);

    /// Commits the current unit of work.
    ///
    /// Only the outermost scope commits physically; nested commits defer to it.
    ///
    /// # Errors
    ///
    /// Returns an error if no unit of work is open.
    fn commit_unit_of_work(&mut self) -> CoreResult<()>;

    /// Closes the current unit of work, aborting uncommitted work when the
    /// outermost scope closes.
    ///
    /// # Errors
    ///
    /// Returns an error if no unit of work is open.
    fn end_unit_of_work(&mut self) -> CoreResult<()>;

    /// Commits outside any unit of work and leaves the unit ready for reuse.
    ///
    /// # Errors
    ///
    /// Returns an error if a unit of work is open.
    fn commit_and_restart(&mut self) -> CoreResult<()>;

    /// Waits until prior commits are durable. Returns false if that could
    /// not be guaranteed.
    fn await_commit(&mut self) -> bool;

    /// Registers a change to commit or roll back with the unit of work.
    fn register_change(&mut self, change: Box<dyn Change>);

    /// Stores an advisory oplog visibility marker.
    fn set_oplog_read_till(&mut self, record: RecordId);

    /// Short name of the implementation, used in errors.
    fn kind(&self) -> &'static str;

    /// Returns this unit as a [`KvRecoveryUnit`], if it is one.
    fn as_kv(&self) -> Option<&KvRecoveryUnit> {
        None
    }

    /// Returns this unit as a mutable [`KvRecoveryUnit`], if it is one.
    fn as_kv_mut(&mut self) -> Option<&mut KvRecoveryUnit> {
        None
    }
}

/// Scoped unit of work.
///
/// Begins a unit of work on construction and ends it on drop. Dropping the
/// guard without calling [`WriteUnitOfWork::commit`] rolls back when it is
/// the outermost scope.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera_core::{Config, KvEngine, WriteUnitOfWork};
/// use tessera_storage::InMemoryStore;
///
/// let engine = KvEngine::new(Arc::new(InMemoryStore::new()), Config::default());
/// let mut unit = engine.recovery_unit();
///
/// let mut wuow = WriteUnitOfWork::new(&mut unit);
/// wuow.put(b"k", b"v".to_vec()).unwrap();
/// wuow.commit().unwrap();
///
/// assert_eq!(unit.get(b"k").unwrap(), Some(b"v".to_vec()));
/// ```
pub struct WriteUnitOfWork<'a, R: RecoveryUnit + ?Sized = KvRecoveryUnit> {
    unit: &'a mut R,
}

impl<'a, R: RecoveryUnit + ?Sized> WriteUnitOfWork<'a, R> {
    /// Begins a unit of work on `unit`.
    pub fn new(unit: &'a mut R) -> Self {
        unit.begin_unit_of_work();
        Self { unit }
    }

    /// Commits and ends the unit of work.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`RecoveryUnit::commit_unit_of_work`].
    pub fn commit(self) -> CoreResult<()> {
        self.unit.commit_unit_of_work()
    }
}

impl<R: RecoveryUnit + ?Sized> Deref for WriteUnitOfWork<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.unit
    }
}

impl<R: RecoveryUnit + ?Sized> DerefMut for WriteUnitOfWork<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.unit
    }
}

impl<R: RecoveryUnit + ?Sized> Drop for WriteUnitOfWork<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.unit.end_unit_of_work() {
            tracing::error!(%err, "failed to end unit of work");
        }
    }
}
