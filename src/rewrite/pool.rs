//! Bounded worker pool for CPU-bound codec work.
//!
//! # Responsibilities
//! - Move decode/transform/encode off the I/O worker threads
//! - Bound how many of those jobs run at once
//!
//! # Design Decisions
//! - Jobs run on Tokio's blocking pool; a semaphore bounds concurrency
//! - The permit moves into the job, so a cancelled caller cannot free a slot
//!   that is still busy
//! - Closing the pool fails new jobs instead of queueing them forever

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::rewrite::error::RewriteError;

/// Semaphore-bounded front for `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct CodecPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl CodecPool {
    /// Create a pool running at most `size` jobs concurrently (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Configured concurrency.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting jobs. Running jobs finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run `job` on a blocking worker once a slot is free.
    pub async fn run<F, T>(&self, job: F) -> Result<T, RewriteError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RewriteError::PoolClosed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        Ok(handle.await?)
    }
}

impl Default for CodecPool {
    fn default() -> Self {
        let size = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(size)
    }
}
