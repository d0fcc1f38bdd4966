//! Error types for dispatcher operations.
//!
//! All dispatcher calls fail synchronously at the call site with one of the
//! variants below. Failures raised by the caller-supplied processing routine
//! are not part of this taxonomy: they are aggregated per item and surfaced
//! through [`Dispatcher::take_failures`](crate::Dispatcher::take_failures).

use thiserror::Error;

/// Errors that can occur during dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `post` or `increase_parallelism_to` was called after `complete()`.
    ///
    /// This is a caller contract violation, not a runtime condition to
    /// recover from: a completed dispatcher firmly rejects further
    /// submissions rather than silently dropping them.
    #[error("dispatcher already completed: no further posts or scale-ups are accepted")]
    AlreadyCompleted,

    /// Backpressure triggered: the configured capacity limit was reached.
    ///
    /// The item was not admitted and the pending count is unchanged. The
    /// caller may retry later, shed load, or propagate the error upward.
    #[error("queue is full: capacity limit is {limit}, observed {observed} pending items")]
    QueueFull {
        /// The capacity limit the dispatcher was configured with.
        limit: usize,
        /// The pending count observed at rejection time (limit + 1 or more).
        observed: usize,
    },

    /// A parallelism of zero workers was requested at construction.
    #[error("invalid parallelism {requested}: at least one worker is required")]
    InvalidParallelism {
        /// The rejected worker count.
        requested: usize,
    },

    /// A scaling target not strictly greater than the current parallelism.
    ///
    /// The worker pool only grows; it never shrinks.
    #[error("invalid scaling target {requested}: must be greater than current parallelism {current}")]
    InvalidScaling {
        /// The degree of parallelism at the time of the call.
        current: usize,
        /// The rejected target.
        requested: usize,
    },
}
