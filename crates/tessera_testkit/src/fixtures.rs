//! Test fixtures and engine helpers.
//!
//! A [`TestEngine`] keeps a typed handle on its [`InMemoryStore`] so tests
//! can look at what actually reached storage, next to the [`KvEngine`] the
//! code under test uses.

use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::{Config, KvEngine, StorageFault};
use tessera_storage::{InMemoryStore, KvStore, StoreStats, WriteBatch, WriteOptions};

/// Fault handler for tests: panics instead of aborting the process.
pub fn panic_on_fault(fault: &StorageFault) -> ! {
    panic!("storage fault: {fault}")
}

/// An engine over an in-memory store.
pub struct TestEngine {
    /// The engine under test.
    pub engine: KvEngine,
    store: Arc<InMemoryStore>,
}

impl TestEngine {
    /// Creates a durable engine whose storage faults panic.
    pub fn new() -> Self {
        Self::with_config(Config::new().fault_handler(panic_on_fault))
    }

    /// Creates an engine whose commits skip the WAL.
    pub fn non_durable() -> Self {
        Self::with_config(Config::new().durable(false).fault_handler(panic_on_fault))
    }

    /// Creates an engine with an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            engine: KvEngine::new(store.clone(), config),
            store,
        }
    }

    /// Returns the underlying store.
    pub fn memory_store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Returns the store's write counters.
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Writes `pairs` straight to the store, bypassing any recovery unit.
    pub fn seed<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::new();
        for (key, value) in pairs {
            batch.put(key.as_ref().to_vec(), value.as_ref().to_vec());
        }
        self.store
            .write(&batch, WriteOptions::durable())
            .expect("Failed to seed store");
    }

    /// Reads the latest committed value of `key`.
    pub fn committed(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(key, None).expect("Failed to read store")
    }

    /// Returns every committed key and value.
    pub fn contents(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.store
            .iter(None)
            .expect("Failed to scan store")
            .collect()
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = KvEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with a fresh [`TestEngine`].
///
/// # Example
///
/// ```rust
/// use tessera_testkit::with_test_engine;
///
/// with_test_engine(|engine| {
///     engine.seed([(b"k", b"v")]);
///     assert_eq!(engine.committed(b"k"), Some(b"v".to_vec()));
/// });
/// ```
pub fn with_test_engine<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine) -> R,
{
    let engine = TestEngine::new();
    f(&engine)
}
