//! Bounded worker pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use super::types::PoolStatus;

/// Tracks statistics for the pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// A semaphore of K permits plus counters. Cloning shares the pool.
#[derive(Clone)]
pub struct WorkerPool {
    name: String,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool of `max_concurrent` slots (at least one).
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            name: name.into(),
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Waits for a free slot.
    pub async fn admit(&self) -> Result<PoolPermit, AcquireError> {
        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        let permit = Arc::clone(&self.semaphore).acquire_owned().await;
        self.stats.queued.fetch_sub(1, Ordering::Relaxed);

        let permit = permit?;
        self.stats.active.fetch_add(1, Ordering::Relaxed);
        Ok(PoolPermit {
            _permit: permit,
            stats: Arc::clone(&self.stats),
            recorded: false,
        })
    }

    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(&self.name, self.max_concurrent)
    }
}

/// A held slot. The slot frees when this is dropped; a slot dropped
/// without a recorded outcome (panic, cancellation) counts as failed.
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
    stats: Arc<PoolStats>,
    recorded: bool,
}

impl PoolPermit {
    /// Records how the job in this slot ended.
    pub fn record(&mut self, success: bool) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        if success {
            self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        if !self.recorded {
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}
