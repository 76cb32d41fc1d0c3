//! Process-wide generation progress.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Workers publish their progress in batches of this many transactions.
pub const PROGRESS_BATCH: u64 = 1000;

/// A progress line is logged each time the total crosses a multiple of this.
pub const PROGRESS_LOG_INTERVAL: u64 = 100_000;

/// Shared counter of generated transactions.
///
/// Totals are approximate while workers run: a worker's trailing partial
/// batch is never published.
#[derive(Debug)]
pub struct ProgressCounter {
    total: AtomicU64,
    log_interval: u64,
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::with_log_interval(PROGRESS_LOG_INTERVAL)
    }

    /// Counter that logs every `log_interval` transactions.
    pub fn with_log_interval(log_interval: u64) -> Self {
        Self {
            total: AtomicU64::new(0),
            log_interval: log_interval.max(1),
        }
    }

    /// Add `n` and return the new total.
    pub fn add(&self, n: u64) -> u64 {
        let previous = self.total.fetch_add(n, Ordering::Relaxed);
        let current = previous + n;
        if current / self.log_interval > previous / self.log_interval {
            info!(total = current, "Generation progress");
        }
        current
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
