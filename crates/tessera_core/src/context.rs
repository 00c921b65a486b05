//! Operation contexts.

use crate::recovery_unit::{NoopRecoveryUnit, RecoveryUnit};
use std::fmt;

/// Per-operation state handed through the execution layer.
///
/// Owns the operation's recovery unit. Code that needs the key-value
/// interface asks for it explicitly with
/// [`KvRecoveryUnit::from_context`](crate::KvRecoveryUnit::from_context).
pub struct OperationContext {
    recovery_unit: Box<dyn RecoveryUnit>,
}

impl OperationContext {
    /// Creates a context around `recovery_unit`.
    pub fn new(recovery_unit: Box<dyn RecoveryUnit>) -> Self {
        Self { recovery_unit }
    }

    /// Creates a context for an operation that never touches storage.
    #[must_use]
    pub fn without_storage() -> Self {
        Self::new(Box::new(NoopRecoveryUnit::new()))
    }

    /// Returns the recovery unit.
    #[must_use]
    pub fn recovery_unit(&self) -> &dyn RecoveryUnit {
        self.recovery_unit.as_ref()
    }

    /// Returns the recovery unit mutably.
    pub fn recovery_unit_mut(&mut self) -> &mut dyn RecoveryUnit {
        self.recovery_unit.as_mut()
    }

    /// Swaps in a new recovery unit and returns the previous one.
    pub fn replace_recovery_unit(
        &mut self,
        recovery_unit: Box<dyn RecoveryUnit>,
    ) -> Box<dyn RecoveryUnit> {
        std::mem::replace(&mut self.recovery_unit, recovery_unit)
    }
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("recovery_unit", &self.recovery_unit.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, CoreError, KvEngine, KvRecoveryUnit};
    use std::sync::Arc;
    use tessera_storage::InMemoryStore;

    #[test]
    fn kv_accessor_on_kv_context() {
        let engine = KvEngine::new(Arc::new(InMemoryStore::new()), Config::default());
        let mut ctx = engine.operation_context();

        let unit = KvRecoveryUnit::from_context(&mut ctx).unwrap();
        unit.begin_unit_of_work();
        unit.put(b"k", b"v".to_vec()).unwrap();
        assert_eq!(unit.pending_ops(), 1);
        assert!(ctx.recovery_unit().as_kv().is_some());
    }

    #[test]
    fn kv_accessor_fails_on_other_kind() {
        let mut ctx = OperationContext::without_storage();
        let err = KvRecoveryUnit::from_context(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            CoreError::RecoveryUnitMismatch {
                expected: "kv",
                found: "noop"
            }
        ));
    }

    #[test]
    fn replace_returns_previous_unit() {
        let engine = KvEngine::new(Arc::new(InMemoryStore::new()), Config::default());
        let mut ctx = OperationContext::without_storage();
        let previous = ctx.replace_recovery_unit(Box::new(engine.recovery_unit()));

        assert_eq!(previous.kind(), "noop");
        assert_eq!(ctx.recovery_unit().kind(), "kv");
        assert!(format!("{ctx:?}").contains("kv"));
    }
}
