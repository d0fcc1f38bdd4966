//! fanout: bounded-concurrency dispatch of work items to a worker pool.
//!
//! A lightweight substitute for a full dataflow library wherever CPU-bound or
//! asynchronous per-item work must be fanned out with controlled concurrency,
//! such as processing build outputs or cache entries. Producers post
//! items into a strict-FIFO queue; a fixed (but growable) pool of workers
//! drives each item through a caller-supplied processing routine, with
//! optional backpressure and a graceful drain-to-completion protocol.
//!
//! What this is not: a dataflow graph (single-stage fan-out only), a priority
//! queue (strict FIFO), or a distributed work queue (strictly in-process).
//!
//! # Example
//!
//! ```rust
//! use fanout::{Dispatcher, DispatcherConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let dispatcher = Dispatcher::new(DispatcherConfig::new(4), |item: u32| async move {
//!     // CPU-bound or asynchronous per-item work goes here.
//!     let _ = item;
//!     Ok(())
//! })?;
//!
//! for item in 0..16 {
//!     dispatcher.post(item)?;
//! }
//!
//! dispatcher.complete();
//! dispatcher.wait_for_drain().await;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;

// Re-export commonly used types
pub use dispatch::{Dispatcher, DispatcherConfig, DispatcherStats, ItemFailure, Parallelism};
pub use error::DispatchError;
