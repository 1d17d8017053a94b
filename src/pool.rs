//! Bounded worker pool with blocking admission and a graceful drain barrier.
//!
//! Admission is the pipeline's only backpressure: `submit` parks the
//! producer until one of the `capacity` slots frees, so series iteration
//! can never run arbitrarily far ahead of chunk-fetch work. Tasks contain
//! their own errors (log and continue); nothing propagates back through
//! `submit`, which keeps `drain` a correct completion signal.
//!
//! There is no ordering guarantee across tasks. Per-series work is
//! independent and the goal is throughput, not sequencing.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::{Error, Result};

/// Fixed-capacity task executor.
///
/// `drain` is terminal: once it returns, further submissions are rejected
/// with [`Error::PoolDrained`]. A new run builds a new pool.
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    capacity: u32,
    drained: AtomicBool,
}

impl WorkerPool {
    /// Create a pool allowing at most `capacity` in-flight tasks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "worker pool capacity must be positive");
        let capacity = u32::try_from(capacity).expect("worker pool capacity fits in u32");
        Self {
            slots: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
            drained: AtomicBool::new(false),
        }
    }

    /// Maximum number of concurrently executing tasks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Submit a task, waiting for a free slot first.
    ///
    /// The await blocks until one of the `capacity` slots is available;
    /// the task then runs concurrently and its slot is released when it
    /// completes. The task must handle its own failures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolDrained`] after [`WorkerPool::drain`] has been
    /// called.
    pub async fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.drained.load(Ordering::Acquire) {
            return Err(Error::PoolDrained);
        }
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| Error::PoolDrained)?;
        tokio::spawn(async move {
            task.await;
            drop(permit);
        });
        Ok(())
    }

    /// Wait for every submitted task to complete, then shut the pool.
    ///
    /// Completeness barrier: all permits must return before `acquire_many`
    /// succeeds, so every task's side effects are observable once this
    /// returns. Draining an already drained pool is a no-op.
    pub async fn drain(&self) {
        self.drained.store(true, Ordering::Release);
        match self.slots.acquire_many(self.capacity).await {
            Ok(all) => drop(all),
            // Already closed by a previous drain.
            Err(_) => return,
        }
        self.slots.close();
        debug!(capacity = self.capacity, "worker pool drained");
    }
}
