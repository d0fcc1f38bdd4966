//! Dispatcher statistics tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time statistics about a dispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatcherStats {
    /// Current degree of parallelism.
    pub parallelism: usize,
    /// Items enqueued or currently being processed.
    pub pending_items: usize,
    /// Workers currently inside the processing routine.
    pub active_workers: usize,
    /// Items whose processing routine returned successfully.
    pub items_completed: u64,
    /// Items whose processing routine failed.
    pub items_failed: u64,
    /// Average processing duration across completed and failed items.
    pub average_item_duration: Duration,
}

impl DispatcherStats {
    /// Returns the total number of items processed (completed + failed).
    pub fn total_processed(&self) -> u64 {
        self.items_completed + self.items_failed
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.items_completed as f64 / total as f64) * 100.0
    }
}

/// Shared atomic counters behind [`DispatcherStats`] snapshots.
///
/// Updated by workers around every processing-routine invocation.
pub(crate) struct SharedDispatchStats {
    items_completed: AtomicU64,
    items_failed: AtomicU64,
    total_duration_ms: AtomicU64,
    active_workers: AtomicU64,
}

impl SharedDispatchStats {
    pub(crate) fn new() -> Self {
        Self {
            items_completed: AtomicU64::new(0),
            items_failed: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            active_workers: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_completion(&self, duration: Duration) {
        self.items_completed.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn record_failure(&self, duration: Duration) {
        self.items_failed.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn increment_active(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn decrement_active(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self, parallelism: usize, pending_items: usize) -> DispatcherStats {
        let completed = self.items_completed.load(Ordering::SeqCst);
        let failed = self.items_failed.load(Ordering::SeqCst);
        let total_duration_ms = self.total_duration_ms.load(Ordering::SeqCst);
        let active = self.active_workers.load(Ordering::SeqCst);

        let total_items = completed + failed;
        let average_duration = if total_items > 0 {
            Duration::from_millis(total_duration_ms / total_items)
        } else {
            Duration::ZERO
        };

        DispatcherStats {
            parallelism,
            pending_items,
            active_workers: active as usize,
            items_completed: completed,
            items_failed: failed,
            average_item_duration: average_duration,
        }
    }
}
