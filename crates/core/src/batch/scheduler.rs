//! Batch scheduler implementation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::archive::ArchiveAggregator;
use crate::job::JobSpec;
use crate::metrics;
use crate::pipeline::{PipelineCoordinator, PipelineError, PipelineResult};

use super::config::BatchConfig;
use super::error::BatchError;
use super::pool::{PoolPermit, WorkerPool};
use super::types::{BatchOutcome, JobDiagnostic, PoolStatus};

/// Runs batches of jobs through a shared worker pool and bundles the
/// artifacts into one archive.
///
/// The pool is shared by every batch and single job submitted through the
/// same scheduler, so the concurrency bound holds process-wide.
pub struct BatchScheduler {
    coordinator: Arc<PipelineCoordinator>,
    aggregator: ArchiveAggregator,
    config: BatchConfig,
    pool: WorkerPool,
}

impl BatchScheduler {
    pub fn new(
        coordinator: Arc<PipelineCoordinator>,
        aggregator: ArchiveAggregator,
        config: BatchConfig,
    ) -> Self {
        let pool = WorkerPool::new("jobs", config.max_concurrent_jobs);
        Self {
            coordinator,
            aggregator,
            config,
            pool,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub fn coordinator(&self) -> &Arc<PipelineCoordinator> {
        &self.coordinator
    }

    /// Runs a single job once a pool slot is free.
    ///
    /// Dropping the returned future cancels the job: its tool processes are
    /// killed, its intermediates removed, and its claim and slot released.
    pub async fn run_job(&self, job: JobSpec) -> PipelineResult {
        let job_id = self.coordinator.resolver().job_id(&job);
        let permit = match self.pool.admit().await {
            Ok(permit) => permit,
            Err(e) => {
                let error = PipelineError::Aborted {
                    reason: e.to_string(),
                };
                return PipelineResult::failed(&job, job_id, error.to_string());
            }
        };
        run_isolated(Arc::clone(&self.coordinator), job, job_id, permit).await
    }

    /// Runs every job, at most K at a time, and archives the successes.
    ///
    /// Jobs are admitted in submission order. Results are gathered in
    /// completion order. A job that fails or panics never affects the
    /// others; the batch only fails as a whole when no artifact was made.
    ///
    /// A job skipped because an identical job is in flight elsewhere counts
    /// as neither succeeded nor failed and adds no entry. A batch made only
    /// of such jobs is therefore `Empty` even though none of them failed.
    ///
    /// Dropping the returned future cancels every job still running.
    pub async fn run(&self, jobs: Vec<JobSpec>) -> Result<BatchOutcome, BatchError> {
        if jobs.is_empty() {
            return Err(BatchError::NoJobs);
        }
        if jobs.len() > self.config.max_jobs_per_batch {
            return Err(BatchError::TooManyJobs {
                count: jobs.len(),
                max: self.config.max_jobs_per_batch,
            });
        }

        let start = Instant::now();
        let total = jobs.len();
        info!(
            "Starting batch of {} jobs (max {} concurrent)",
            total,
            self.pool.max_concurrent()
        );

        let mut tasks = JoinSet::new();
        for job in jobs {
            let job_id = self.coordinator.resolver().job_id(&job);
            let permit = match self.pool.admit().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Worker pool closed while admitting job {}: {}", job_id, e);
                    break;
                }
            };
            let coordinator = Arc::clone(&self.coordinator);
            tasks.spawn(run_isolated(coordinator, job, job_id, permit));
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Batch worker ended without a result: {}", e),
            }
        }

        let artifacts = collect_artifacts(&results);
        let failed = results.iter().filter(|r| r.is_failed()).count();
        let in_flight = results
            .iter()
            .filter(|r| !r.is_success() && !r.is_failed())
            .count();

        if artifacts.is_empty() {
            metrics::BATCHES_TOTAL.with_label_values(&["empty"]).inc();
            warn!(
                "Batch of {} jobs produced no artifacts ({} failed, {} in flight elsewhere)",
                total, failed, in_flight
            );
            return Err(BatchError::Empty {
                diagnostics: results.iter().map(JobDiagnostic::from).collect(),
            });
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let archive_reference = self.aggregator.bundle(&artifacts).await?;
        metrics::BATCHES_TOTAL.with_label_values(&["archived"]).inc();
        info!(
            "Batch finished in {}ms: {} succeeded, {} failed, archive {}",
            start.elapsed().as_millis(),
            succeeded,
            failed,
            archive_reference.display()
        );

        Ok(BatchOutcome {
            archive_reference,
            results,
            succeeded,
            failed,
            in_flight,
        })
    }
}

/// Aborts the task when dropped, so the job stops with whoever awaits it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs the job on its own task so a panic inside the pipeline becomes a
/// failed result instead of tearing down the caller.
///
/// The slot moves into that task and frees only when the pipeline future
/// is gone, after its cleanup guard and claim have been dropped.
async fn run_isolated(
    coordinator: Arc<PipelineCoordinator>,
    job: JobSpec,
    job_id: String,
    permit: PoolPermit,
) -> PipelineResult {
    let spec = job.clone();
    let mut handle = AbortOnDrop(tokio::spawn(async move {
        let mut permit = permit;
        let result = coordinator.run(&spec).await;
        permit.record(!result.is_failed());
        result
    }));
    match (&mut handle.0).await {
        Ok(result) => result,
        Err(e) => {
            error!("Job {} aborted: {}", job_id, e);
            let error = PipelineError::Aborted {
                reason: e.to_string(),
            };
            PipelineResult::failed(&job, job_id, error.to_string())
        }
    }
}

/// Artifact paths of successful results, first occurrence kept.
fn collect_artifacts(results: &[PipelineResult]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter_map(|r| r.artifact.clone())
        .filter(|path| seen.insert(path.clone()))
        .collect()
}
