//! Engine: shared services and recovery unit factory.

use crate::config::Config;
use crate::context::OperationContext;
use crate::counter::{load_counter, Counter};
use crate::error::CoreResult;
use crate::recovery_unit::KvRecoveryUnit;
use crate::transaction::TransactionEngine;
use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use tessera_storage::KvStore;

/// Owns the services every recovery unit shares: the store and the conflict
/// tracker.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera_core::{Config, KvEngine, RecoveryUnit};
/// use tessera_storage::InMemoryStore;
///
/// let engine = KvEngine::new(Arc::new(InMemoryStore::new()), Config::default());
/// let mut unit = engine.recovery_unit();
///
/// unit.begin_unit_of_work();
/// unit.put(b"k", b"v".to_vec()).unwrap();
/// unit.commit_unit_of_work().unwrap();
/// unit.end_unit_of_work().unwrap();
///
/// let mut reader = engine.recovery_unit();
/// assert_eq!(reader.get(b"k").unwrap(), Some(b"v".to_vec()));
/// ```
pub struct KvEngine {
    store: Arc<dyn KvStore>,
    tracker: Arc<TransactionEngine>,
    config: Config,
}

impl KvEngine {
    /// Creates an engine over `store`.
    pub fn new(store: Arc<dyn KvStore>, config: Config) -> Self {
        Self {
            store,
            tracker: Arc::new(TransactionEngine::new()),
            config,
        }
    }

    /// Creates a recovery unit using the engine's durability setting.
    #[must_use]
    pub fn recovery_unit(&self) -> KvRecoveryUnit {
        KvRecoveryUnit::new(
            Arc::clone(&self.store),
            Arc::clone(&self.tracker) as _,
            &self.config,
        )
    }

    /// Creates a recovery unit with an explicit durability setting.
    #[must_use]
    pub fn recovery_unit_with_durability(&self, durable: bool) -> KvRecoveryUnit {
        let config = self.config.clone().durable(durable);
        KvRecoveryUnit::new(Arc::clone(&self.store), Arc::clone(&self.tracker) as _, &config)
    }

    /// Creates an operation context holding a fresh recovery unit.
    #[must_use]
    pub fn operation_context(&self) -> OperationContext {
        OperationContext::new(Box::new(self.recovery_unit()))
    }

    /// Creates a shared counter seeded from its persisted total.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the value is corrupt.
    pub fn load_counter(&self, key: &[u8]) -> CoreResult<Counter> {
        let value = load_counter(self.store.as_ref(), key)?;
        Ok(Arc::new(AtomicI64::new(value)))
    }

    /// Returns the shared store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Returns the shared conflict tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<TransactionEngine> {
        &self.tracker
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl fmt::Debug for KvEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvEngine")
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::encode_counter;
    use crate::recovery_unit::RecoveryUnit;
    use std::sync::atomic::Ordering;
    use tessera_storage::InMemoryStore;

    #[test]
    fn units_get_distinct_transactions() {
        let engine = KvEngine::new(Arc::new(InMemoryStore::new()), Config::default());
        let a = engine.recovery_unit();
        let b = engine.recovery_unit();
        assert_ne!(a.transaction_id(), b.transaction_id());
    }

    #[test]
    fn durability_override() {
        let engine = KvEngine::new(Arc::new(InMemoryStore::new()), Config::default());
        assert!(engine.recovery_unit().is_durable());
        assert!(!engine.recovery_unit_with_durability(false).is_durable());
    }

    #[test]
    fn load_counter_seeds_from_store() {
        let engine = KvEngine::new(Arc::new(InMemoryStore::new()), Config::default());
        let counter = engine.load_counter(b"count").unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 0);

        let mut unit = engine.recovery_unit();
        unit.begin_unit_of_work();
        unit.increment_counter(b"count", &counter, 12).unwrap();
        unit.commit_unit_of_work().unwrap();
        unit.end_unit_of_work().unwrap();

        let reloaded = engine.load_counter(b"count").unwrap();
        assert_eq!(reloaded.load(Ordering::Relaxed), 12);
        assert_eq!(
            engine.store().get(b"count", None).unwrap(),
            Some(encode_counter(12).to_vec())
        );
    }
}
