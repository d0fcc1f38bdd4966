//! Bounded-concurrency fan-out of work items to a worker pool.
//!
//! This module provides the dispatcher core:
//!
//! - **Dispatcher**: admission control, completion/drain protocol, live
//!   scale-up of the worker pool
//! - **DispatcherConfig**: construction-time configuration with validation
//! - **DispatcherStats**: live counters for monitoring a running dispatcher
//!
//! # Architecture
//!
//! ```text
//!   Producers                  Dispatcher
//!  ┌─────────┐      ┌────────────────────────────────┐
//!  │ post()  ├──────►  FIFO queue      permit signal │
//!  └─────────┘      │  (items)         (semaphore)   │
//!  ┌─────────┐      └───────┬──────────────┬─────────┘
//!  │ post()  ├──────────────┘              │ wake
//!  └─────────┘             ┌───────────────┼───────────────┐
//!                          ▼               ▼               ▼
//!                     ┌─────────┐     ┌─────────┐     ┌─────────┐
//!                     │ Worker 0│     │ Worker 1│     │ Worker N│
//!                     └─────────┘     └─────────┘     └─────────┘
//!                          │               │               │
//!                          └── processing routine (caller-supplied)
//! ```
//!
//! Every accepted post enqueues the item and releases one permit; each worker
//! loops on "wait for permit, claim item, run the routine, account for it".
//! `complete()` closes admission and releases a single extra permit; the
//! worker that then observes a zero pending count wakes the whole pool so
//! every worker exits without deadlock.
//!
//! # Example
//!
//! ```rust
//! use fanout::{Dispatcher, DispatcherConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::new(2).with_name("build-outputs"),
//!     |path: String| async move {
//!         tracing::debug!(%path, "processing build output");
//!         Ok(())
//!     },
//! )?;
//!
//! dispatcher.post("obj/a.o".to_string())?;
//! dispatcher.post("obj/b.o".to_string())?;
//!
//! dispatcher.complete();
//! dispatcher.wait_for_drain().await;
//! assert_eq!(dispatcher.pending_count(), 0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
mod queue;
pub mod stats;

// Re-export main types for convenience
pub use config::{DispatcherConfig, Parallelism};
pub use dispatcher::{Dispatcher, ItemFailure};
pub use stats::DispatcherStats;
