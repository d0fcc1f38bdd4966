//! Bounded-concurrency dispatcher over a shared FIFO queue.
//!
//! The dispatcher fans posted items out to a pool of worker tasks through a
//! counting semaphore. Three ordering rules make the protocol sound:
//!
//! 1. An accepted item is pushed into the queue *before* its permit is
//!    released, so a woken worker always finds work (except for the
//!    deliberate shutdown permits).
//! 2. Workers decrement the pending count *after* finishing an item and only
//!    then evaluate the drain condition, so the count reaching zero means no
//!    item is queued or in flight and admission is closed.
//! 3. The worker that observes the drained state releases one permit per
//!    worker, waking every parked peer; peers that wake with nothing to do
//!    re-check the same condition and exit.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use crate::error::DispatchError;

use super::config::DispatcherConfig;
use super::queue::ItemQueue;
use super::stats::{DispatcherStats, SharedDispatchStats};

/// Type-erased processing routine shared by all workers.
type ProcessFn<T> = dyn Fn(T) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// A failure raised by the processing routine for a single item.
///
/// Failures are aggregated per dispatcher and retrieved with
/// [`Dispatcher::take_failures`]; they never stop the worker loop.
#[derive(Debug)]
pub struct ItemFailure {
    /// Admission sequence number of the failed item. The first accepted post
    /// is sequence 0.
    pub sequence: u64,
    /// The error the processing routine returned, or a description of its
    /// panic.
    pub error: anyhow::Error,
}

/// A queued item together with its admission sequence number.
struct Work<T> {
    sequence: u64,
    item: T,
}

/// Handle to a bounded-concurrency dispatcher.
///
/// Created with [`Dispatcher::new`], which immediately starts the configured
/// number of worker tasks. The handle is cheap to clone; clones share the
/// same queue, worker pool, and completion state, so any producer thread or
/// task can post items.
///
/// # Lifecycle
///
/// A dispatcher accepts posts until [`complete`](Self::complete) is called,
/// then drains: admitted items finish processing and every worker exits.
/// [`wait_for_drain`](Self::wait_for_drain) resolves once the pool is fully
/// drained. A dispatcher that is never completed keeps its workers parked
/// indefinitely.
pub struct Dispatcher<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    name: String,
    routine: Box<ProcessFn<T>>,
    queue: ItemQueue<Work<T>>,
    /// Items admitted but not yet finished. Transiently dips below zero when
    /// shutdown permits are consumed by workers with no remaining work.
    pending: AtomicI64,
    /// Monotonic sequence number assigned per accepted post.
    admitted: AtomicU64,
    capacity_limit: Option<usize>,
    parallelism: AtomicUsize,
    completion_requested: AtomicBool,
    /// Counting signal: one permit per claimable item, plus transient
    /// wake-for-shutdown permits.
    permits: Semaphore,
    stats: SharedDispatchStats,
    failures: Mutex<Vec<ItemFailure>>,
    completion_tx: watch::Sender<bool>,
    drained_tx: watch::Sender<bool>,
    /// Workers started but not yet exited; the last exit publishes drain.
    workers_live: AtomicUsize,
    next_worker: AtomicUsize,
    /// Serializes `complete` against `increase_parallelism_to` so no worker
    /// is spawned into a pool that is already draining. Never held across an
    /// await point.
    lifecycle: Mutex<()>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Creates a dispatcher and immediately starts its workers.
    ///
    /// The processing routine is invoked concurrently from multiple workers,
    /// one item at a time per worker, and must not assume any particular
    /// worker identity. Errors it returns are aggregated per item (see
    /// [`take_failures`](Self::take_failures)), not propagated to siblings.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidParallelism` if the configuration
    /// requests zero workers.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime, since it spawns the
    /// worker tasks.
    pub fn new<F, Fut>(config: DispatcherConfig, routine: F) -> Result<Self, DispatchError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        config.validate()?;
        let parallelism = config.parallelism.resolve();

        let (completion_tx, _) = watch::channel(false);
        let (drained_tx, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            name: config.name,
            routine: Box::new(move |item| routine(item).boxed()),
            queue: ItemQueue::new(),
            pending: AtomicI64::new(0),
            admitted: AtomicU64::new(0),
            capacity_limit: config.capacity_limit,
            parallelism: AtomicUsize::new(parallelism),
            completion_requested: AtomicBool::new(false),
            permits: Semaphore::new(0),
            stats: SharedDispatchStats::new(),
            failures: Mutex::new(Vec::new()),
            completion_tx,
            drained_tx,
            workers_live: AtomicUsize::new(0),
            next_worker: AtomicUsize::new(0),
            lifecycle: Mutex::new(()),
        });

        for _ in 0..parallelism {
            Inner::spawn_worker(&inner);
        }

        info!(
            name = %inner.name,
            parallelism,
            capacity = ?inner.capacity_limit,
            "dispatcher started"
        );

        Ok(Self { inner })
    }

    /// Posts an item for processing.
    ///
    /// Admission is fire-and-forget: a successful post only guarantees the
    /// item will eventually be claimed by a worker. This call never blocks.
    ///
    /// # Errors
    ///
    /// - `DispatchError::AlreadyCompleted` if [`complete`](Self::complete)
    ///   has been called.
    /// - `DispatchError::QueueFull` if a capacity limit is configured and the
    ///   pending count would exceed it; the item is not admitted.
    pub fn post(&self, item: T) -> Result<(), DispatchError> {
        if self.inner.completion_requested.load(Ordering::SeqCst) {
            return Err(DispatchError::AlreadyCompleted);
        }

        let observed = self.inner.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.inner.capacity_limit {
            if observed > limit as i64 {
                self.inner.pending.fetch_sub(1, Ordering::SeqCst);
                return Err(DispatchError::QueueFull {
                    limit,
                    observed: observed as usize,
                });
            }
        }

        let sequence = self.inner.admitted.fetch_add(1, Ordering::SeqCst);
        self.inner.queue.push(Work { sequence, item });
        // The item must be visible in the queue before the permit is: a
        // worker woken by this permit expects to find something to claim.
        self.inner.permits.add_permits(1);
        Ok(())
    }

    /// Closes admission and lets the pool drain.
    ///
    /// Idempotent: a second call is a no-op. Fires the completion signal
    /// immediately and releases a single permit; the woken worker cascades
    /// the shutdown to its peers once the pending count reaches zero. Items
    /// already admitted or in flight always run to completion.
    pub fn complete(&self) {
        let _guard = self.inner.lifecycle.lock().expect("lifecycle mutex poisoned");
        if self.inner.completion_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(
            name = %self.inner.name,
            pending = self.pending_count(),
            queued = self.inner.queue.len(),
            "dispatcher completion requested"
        );
        self.inner.completion_tx.send_replace(true);
        // One permit wakes one parked worker; with nothing left to do it
        // observes the drain condition and releases the rest of the pool.
        self.inner.permits.add_permits(1);
    }

    /// Suspends until admission is closed and every worker has exited.
    ///
    /// Safe to call multiple times and from multiple callers concurrently;
    /// all waiters are released together once the pool has drained. Awaits
    /// indefinitely if [`complete`](Self::complete) is never called. Callers
    /// that want a bound can wrap this in `tokio::time::timeout`.
    pub async fn wait_for_drain(&self) {
        let mut drained = self.inner.drained_tx.subscribe();
        // The sender lives inside `inner`, which `self` keeps alive, so the
        // channel cannot close while we wait.
        let _ = drained.wait_for(|done| *done).await;
    }

    /// Suspends until [`complete`](Self::complete) has been called.
    ///
    /// Resolves as soon as admission closes, independent of whether in-flight
    /// items have finished. Observers that need full drain should use
    /// [`wait_for_drain`](Self::wait_for_drain) instead.
    pub async fn wait_for_completion(&self) {
        let mut completed = self.inner.completion_tx.subscribe();
        let _ = completed.wait_for(|done| *done).await;
    }

    /// Grows the worker pool to `target` workers.
    ///
    /// New workers join the same queue and permit signal; already-queued
    /// items are never migrated or rebalanced. The pool never shrinks.
    ///
    /// # Errors
    ///
    /// - `DispatchError::AlreadyCompleted` if [`complete`](Self::complete)
    ///   has been called.
    /// - `DispatchError::InvalidScaling` if `target` is not strictly greater
    ///   than the current parallelism.
    pub fn increase_parallelism_to(&self, target: usize) -> Result<(), DispatchError> {
        let _guard = self.inner.lifecycle.lock().expect("lifecycle mutex poisoned");
        if self.inner.completion_requested.load(Ordering::SeqCst) {
            return Err(DispatchError::AlreadyCompleted);
        }

        let current = self.inner.parallelism.load(Ordering::SeqCst);
        if target <= current {
            return Err(DispatchError::InvalidScaling { current, requested: target });
        }

        // Publish the new degree first so a later drain cascade releases
        // enough permits for every worker that may be parked.
        self.inner.parallelism.store(target, Ordering::SeqCst);
        for _ in current..target {
            Inner::spawn_worker(&self.inner);
        }

        info!(
            name = %self.inner.name,
            from = current,
            to = target,
            "dispatcher parallelism increased"
        );
        Ok(())
    }

    /// Items admitted but not yet finished (queued or in flight).
    pub fn pending_count(&self) -> usize {
        // The raw counter dips below zero while shutdown permits are being
        // consumed; that is bookkeeping, not real work, so clamp it away.
        self.inner.pending.load(Ordering::SeqCst).max(0) as usize
    }

    /// Current degree of parallelism.
    pub fn parallelism(&self) -> usize {
        self.inner.parallelism.load(Ordering::SeqCst)
    }

    /// Whether [`complete`](Self::complete) has been called.
    pub fn is_completed(&self) -> bool {
        self.inner.completion_requested.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the dispatcher's statistics.
    pub fn stats(&self) -> DispatcherStats {
        self.inner
            .stats
            .snapshot(self.parallelism(), self.pending_count())
    }

    /// Removes and returns all processing failures recorded so far.
    ///
    /// Each entry carries the admission sequence number of the failed item.
    /// Typically called after [`wait_for_drain`](Self::wait_for_drain) to
    /// inspect the complete failure set; calling it earlier returns whatever
    /// has been recorded up to that point.
    pub fn take_failures(&self) -> Vec<ItemFailure> {
        std::mem::take(&mut *self.inner.failures.lock().expect("failures mutex poisoned"))
    }
}

impl<T: Send + 'static> Inner<T> {
    fn spawn_worker(this: &Arc<Self>) {
        let id = this.next_worker.fetch_add(1, Ordering::SeqCst);
        this.workers_live.fetch_add(1, Ordering::SeqCst);

        let worker = Arc::clone(this);
        tokio::spawn(async move {
            worker.run_worker(id).await;
        });
    }

    /// Main worker loop: wait for a permit, claim an item, account for it,
    /// re-check the drain condition.
    async fn run_worker(self: Arc<Self>, id: usize) {
        debug!(name = %self.name, worker = id, "worker started");

        loop {
            // Err only if the semaphore is closed, which this module never
            // does; treat it as a shutdown nudge all the same.
            let Ok(permit) = self.permits.acquire().await else {
                break;
            };
            // The protocol keeps its own count; the permit is consumed for
            // good rather than returned on drop.
            permit.forget();

            if let Some(work) = self.queue.pop() {
                self.process(id, work).await;
            }
            // A permit with no queued item behind it is a shutdown signal;
            // it still consumes one unit of pending accounting, which is why
            // the counter can dip below zero near the end.
            let remaining = self.pending.fetch_sub(1, Ordering::SeqCst) - 1;
            if remaining <= 0 && self.completion_requested.load(Ordering::SeqCst) {
                // Wake the whole pool: this worker cannot know how many
                // peers are still parked. Spurious wake-ups land back here
                // and exit immediately.
                self.permits.add_permits(self.parallelism.load(Ordering::SeqCst));
                break;
            }
        }

        debug!(name = %self.name, worker = id, "worker stopped");
        if self.workers_live.fetch_sub(1, Ordering::SeqCst) == 1 {
            info!(name = %self.name, "dispatcher drained");
            self.drained_tx.send_replace(true);
        }
    }

    /// Runs the processing routine for one item, isolating failures.
    async fn process(&self, worker: usize, work: Work<T>) {
        self.stats.increment_active();
        let started = Instant::now();
        let result = AssertUnwindSafe((self.routine)(work.item))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();
        self.stats.decrement_active();

        let error = match result {
            Ok(Ok(())) => {
                self.stats.record_completion(elapsed);
                return;
            }
            Ok(Err(error)) => error,
            Err(panic) => anyhow::anyhow!("processing routine panicked: {}", panic_message(&panic)),
        };

        warn!(
            name = %self.name,
            worker,
            sequence = work.sequence,
            error = %error,
            "item processing failed"
        );
        self.stats.record_failure(elapsed);
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .push(ItemFailure {
                sequence: work.sequence,
                error,
            });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
