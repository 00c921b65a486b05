//! Stress tests for the recovery unit.
//!
//! These drive many threads through conflicting units of work and check
//! that exactly the committed work is visible afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tessera_core::{Counter, CoreError, KvEngine, RecoveryUnit};

/// Key every stress writer competes for.
pub const HOT_KEY: &[u8] = b"stress/hot";

/// Counter bumped once per committed stress unit.
pub const COMMITS_KEY: &[u8] = b"stress/commits";

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Units of work that committed.
    pub commits: usize,
    /// Write conflicts that forced a retry.
    pub conflicts: usize,
    /// Units of work that gave up after too many retries.
    pub gave_up: usize,
    /// Total duration.
    pub duration: Duration,
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Units of work each thread commits.
    pub units_per_thread: usize,
    /// Retries allowed per unit of work before giving up.
    pub max_retries: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            units_per_thread: 200,
            max_retries: 10_000,
        }
    }
}

/// Runs writers that all update [`HOT_KEY`] and bump the counter stored at
/// [`COMMITS_KEY`], retrying on write conflicts.
///
/// Each committed unit also writes a key of its own, so the store ends up
/// holding `commits` distinct per-unit keys.
pub fn stress_conflicting_writers(
    engine: &KvEngine,
    counter: &Counter,
    config: &StressConfig,
) -> StressTestResult {
    let commits = AtomicUsize::new(0);
    let conflicts = AtomicUsize::new(0);
    let gave_up = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|scope| {
        for thread_id in 0..config.threads {
            let (commits, conflicts, gave_up) = (&commits, &conflicts, &gave_up);
            scope.spawn(move || {
                for i in 0..config.units_per_thread {
                    let own_key = format!("stress/{thread_id}/{i}").into_bytes();
                    let mut attempts = 0;
                    loop {
                        match write_once(engine, counter, &own_key) {
                            Ok(()) => {
                                commits.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(err) if err.is_retryable() => {
                                conflicts.fetch_add(1, Ordering::Relaxed);
                                attempts += 1;
                                if attempts > config.max_retries {
                                    gave_up.fetch_add(1, Ordering::Relaxed);
                                    break;
                                }
                                thread::yield_now();
                            }
                            Err(err) => panic!("stress writer failed: {err}"),
                        }
                    }
                }
            });
        }
    });

    let result = StressTestResult {
        commits: commits.into_inner(),
        conflicts: conflicts.into_inner(),
        gave_up: gave_up.into_inner(),
        duration: start.elapsed(),
    };
    tracing::info!(
        commits = result.commits,
        conflicts = result.conflicts,
        gave_up = result.gave_up,
        elapsed = ?result.duration,
        "stress run finished"
    );
    result
}

fn write_once(engine: &KvEngine, counter: &Counter, own_key: &[u8]) -> Result<(), CoreError> {
    let mut unit = engine.recovery_unit();
    unit.begin_unit_of_work();
    unit.put(HOT_KEY, own_key.to_vec())?;
    unit.put(own_key, b"done".to_vec())?;
    unit.increment_counter(COMMITS_KEY, counter, 1)?;
    unit.commit_unit_of_work()?;
    unit.end_unit_of_work()
}
