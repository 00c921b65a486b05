//! Recovery unit configuration.

use crate::error::StorageFault;
use std::fmt;

/// Called when a commit batch cannot be applied. Never returns.
pub type FaultHandler = fn(&StorageFault) -> !;

/// Default [`FaultHandler`]: log the fault and abort the process.
pub fn abort_on_fault(fault: &StorageFault) -> ! {
    tracing::error!(%fault, "storage fault during commit, aborting process");
    std::process::abort()
}

/// Configuration shared by the recovery units an engine creates.
#[derive(Clone)]
pub struct Config {
    /// Whether commit batches go through the write-ahead log.
    ///
    /// Non-durable units apply their batches with the WAL disabled; the
    /// writes become durable on the next WAL flush.
    pub durable: bool,

    /// What to do when the store rejects a commit batch.
    pub fault_handler: FaultHandler,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            durable: true,
            fault_handler: abort_on_fault,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether commits are durable.
    #[must_use]
    pub const fn durable(mut self, value: bool) -> Self {
        self.durable = value;
        self
    }

    /// Sets the storage fault handler.
    #[must_use]
    pub const fn fault_handler(mut self, handler: FaultHandler) -> Self {
        self.fault_handler = handler;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("durable", &self.durable)
            .finish_non_exhaustive()
    }
}
