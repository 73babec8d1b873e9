//! Batch scheduling.
//!
//! A batch is a list of [`JobSpec`](crate::job::JobSpec)s run through the
//! pipeline with at most K jobs in flight. Jobs are admitted in submission
//! order and results are collected as they complete. Every successful
//! artifact is bundled into one zip archive; the batch only fails as a whole
//! when nothing succeeded.

mod config;
mod error;
mod pool;
mod scheduler;
mod types;

pub use config::BatchConfig;
pub use error::BatchError;
pub use pool::{PoolPermit, WorkerPool};
pub use scheduler::BatchScheduler;
pub use types::{BatchOutcome, JobDiagnostic, PoolStatus};
