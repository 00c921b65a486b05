//! Recovery unit for operations that never touch the store.

use crate::change::{Change, ChangeList};
use crate::error::{CoreError, CoreResult};
use crate::recovery_unit::RecoveryUnit;
use crate::types::RecordId;

/// Recovery unit without storage.
///
/// It keeps the nesting rules and the change protocol so code that only
/// registers in-memory changes behaves the same as under a
/// [`KvRecoveryUnit`](crate::KvRecoveryUnit).
#[derive(Debug, Default)]
pub struct NoopRecoveryUnit {
    depth: u32,
    changes: ChangeList,
    oplog_read_till: Option<RecordId>,
}

impl NoopRecoveryUnit {
    /// Name reported by [`RecoveryUnit::kind`].
    pub const KIND: &'static str = "noop";

    /// Creates a new unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open units of work.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Advisory oplog visibility marker.
    #[must_use]
    pub fn oplog_read_till(&self) -> Option<RecordId> {
        self.oplog_read_till
    }
}

impl RecoveryUnit for NoopRecoveryUnit {
    fn begin_unit_of_work(&mut self) {
        self.depth += 1;
    }

    fn commit_unit_of_work(&mut self) -> CoreResult<()> {
        match self.depth {
            0 => Err(CoreError::invalid_operation(
                "commit_unit_of_work called outside a unit of work",
            )),
            1 => {
                self.changes.commit_all();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn end_unit_of_work(&mut self) -> CoreResult<()> {
        if self.depth == 0 {
            return Err(CoreError::invalid_operation(
                "end_unit_of_work called outside a unit of work",
            ));
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.changes.rollback_all();
        }
        Ok(())
    }

    fn commit_and_restart(&mut self) -> CoreResult<()> {
        if self.depth != 0 {
            return Err(CoreError::invalid_operation(
                "commit_and_restart called inside a unit of work",
            ));
        }
        self.changes.commit_all();
        Ok(())
    }

    fn await_commit(&mut self) -> bool {
        true
    }

    fn register_change(&mut self, change: Box<dyn Change>) {
        self.changes.register(change);
    }

    fn set_oplog_read_till(&mut self, record: RecordId) {
        self.oplog_read_till = Some(record);
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

impl Drop for NoopRecoveryUnit {
    fn drop(&mut self) {
        self.changes.rollback_all();
    }
}
