//! Pipeline coordinator implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::identity::{IdentityResolver, Resolution, ResolvedJob};
use crate::janitor::{remove_path, CleanupGuard};
use crate::job::JobSpec;
use crate::metrics;
use crate::stages::{
    is_nonempty_file, AcquireError, Acquirer, AudioFormat, ChainVariant, DemucsSeparator,
    EncodeJob, Encoder, FfmpegEncoder, FilterChain, RetryConfig, Separator, YtDlpAcquirer,
};

use super::config::PipelineConfig;
use super::error::{FinalizeError, PipelineError};
use super::state::JobState;
use super::types::{PipelineResult, StageName, StageOutcome};

/// Name of the separation output tree inside a job's scratch directory.
const SEPARATION_DIR: &str = "separated";

/// Drives single jobs from a [`JobSpec`] to a canonical artifact.
///
/// Cheap to share: batch workers hold it behind an `Arc`.
pub struct PipelineCoordinator {
    resolver: IdentityResolver,
    acquirer: Arc<dyn Acquirer>,
    separator: Arc<dyn Separator>,
    encoder: Arc<dyn Encoder>,
    config: PipelineConfig,
    retry: RetryConfig,
    format: AudioFormat,
}

/// What one run accumulates besides its terminal state.
#[derive(Default)]
struct RunRecord {
    stages: Vec<StageOutcome>,
    chain: Option<ChainVariant>,
}

impl RunRecord {
    fn push(&mut self, job_id: &str, outcome: StageOutcome) {
        metrics::STAGE_DURATION
            .with_label_values(&[outcome.stage().as_str(), outcome.status().as_str()])
            .observe(outcome.duration_ms() as f64 / 1000.0);
        debug!(
            "Job {} stage {} -> {}",
            job_id,
            outcome.stage().as_str(),
            outcome.status().as_str()
        );
        self.stages.push(outcome);
    }
}

impl PipelineCoordinator {
    /// Creates a coordinator over the given stage implementations.
    pub fn new(
        resolver: IdentityResolver,
        acquirer: Arc<dyn Acquirer>,
        separator: Arc<dyn Separator>,
        encoder: Arc<dyn Encoder>,
        config: PipelineConfig,
        format: AudioFormat,
    ) -> Self {
        Self {
            resolver,
            acquirer,
            separator,
            encoder,
            config,
            retry: RetryConfig::default(),
            format,
        }
    }

    /// Creates a coordinator with the real tools described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let resolver = IdentityResolver::new(
            &config.storage.root,
            config.storage.scratch_root(),
            config.storage.output_format.extension(),
            &config.tools.acquire.audio_format,
            config.pipeline.max_duration_secs,
        );
        Self::new(
            resolver,
            Arc::new(YtDlpAcquirer::new(config.tools.acquire.clone())),
            Arc::new(DemucsSeparator::new(config.tools.separate.clone())),
            Arc::new(FfmpegEncoder::new(config.tools.encode.clone())),
            config.pipeline.clone(),
            config.storage.output_format,
        )
        .with_retry(config.tools.acquire.retry.clone())
    }

    /// Sets the retry policy for transient acquisition failures.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one job to completion. Never panics on job failure; the outcome
    /// is always reported through the returned result.
    pub async fn run(&self, job: &JobSpec) -> PipelineResult {
        let start = Instant::now();

        let resolution = match self.resolver.resolve(job).await {
            Ok(resolution) => resolution,
            Err(e) => {
                let job_id = self.resolver.job_id(job);
                warn!("Job {} could not be resolved: {}", job_id, e);
                let error = PipelineError::from(e);
                return self.finish(PipelineResult::failed(job, job_id, error.to_string()), start);
            }
        };

        let resolved = match resolution {
            Resolution::Skip {
                job_id,
                canonical_path,
                reason,
            } => {
                info!(
                    "Skipping job {} ({:?}): {}",
                    job_id,
                    reason,
                    canonical_path.display()
                );
                let mut result = PipelineResult::new(job, job_id);
                if reason == crate::identity::SkipReason::AlreadyExists {
                    result.artifact = Some(canonical_path.clone());
                }
                result.canonical_path = Some(canonical_path);
                result.skipped = Some(reason);
                return self.finish(result, start);
            }
            Resolution::Proceed(resolved) => resolved,
        };

        info!(
            "Running job {} ({} -> {})",
            resolved.job_id,
            job.source_ref,
            resolved.canonical_path.display()
        );

        let mut guard = CleanupGuard::new(format!("job-{}", resolved.job_id));
        guard.track(&resolved.working_path);
        guard.track(&resolved.scratch_dir);
        guard.track(&resolved.temp_output_path);

        let mut record = RunRecord::default();
        let outcome = self.execute(job, &resolved, &mut record, &mut guard).await;
        guard.sweep().await;

        let mut result = PipelineResult::new(job, resolved.job_id.clone());
        result.canonical_path = Some(resolved.canonical_path.clone());
        result.stages = record.stages;
        result.chain = record.chain;
        match outcome {
            Ok(()) => {
                info!(
                    "Job {} done: {}",
                    resolved.job_id,
                    resolved.canonical_path.display()
                );
                result.artifact = Some(resolved.canonical_path.clone());
            }
            Err(e) => {
                warn!("Job {} failed in {}: {}", resolved.job_id, e.phase(), e);
                result.error = Some(e.to_string());
            }
        }

        // Claim goes last, after intermediates are gone.
        resolved.release();
        self.finish(result, start)
    }

    fn finish(&self, mut result: PipelineResult, start: Instant) -> PipelineResult {
        result.duration_ms = start.elapsed().as_millis() as u64;
        metrics::JOBS_TOTAL
            .with_label_values(&[result.result_label()])
            .inc();
        result
    }

    /// The state machine. Returns once a terminal state is reached.
    async fn execute(
        &self,
        job: &JobSpec,
        resolved: &ResolvedJob,
        record: &mut RunRecord,
        guard: &mut CleanupGuard,
    ) -> Result<(), PipelineError> {
        let job_id = resolved.job_id.as_str();
        let mut state = JobState::Acquire;

        loop {
            if !state.is_terminal() {
                debug!("Job {} entering {}", job_id, state.name());
            }
            state = match state {
                JobState::Acquire => {
                    let started = Instant::now();
                    match self
                        .acquire_with_retry(job_id, &job.source_ref, &resolved.working_path)
                        .await
                    {
                        Ok(attempts) => {
                            let mut outcome = StageOutcome::success(
                                StageName::Acquire,
                                Some(&resolved.working_path),
                                started,
                            );
                            if attempts > 1 {
                                outcome = outcome.with_note(format!("succeeded on attempt {}", attempts));
                            }
                            record.push(job_id, outcome);
                            JobState::Probe
                        }
                        Err(e) => {
                            record.push(
                                job_id,
                                StageOutcome::failed(StageName::Acquire, e.to_string(), started),
                            );
                            JobState::Failed(e.into())
                        }
                    }
                }

                JobState::Probe => {
                    let started = Instant::now();
                    match self.separator.probe().await {
                        Ok(()) => {
                            record.push(job_id, StageOutcome::success(StageName::Probe, None, started));
                            JobState::Separate
                        }
                        Err(e) => {
                            info!("Job {}: separation unavailable ({}), using basic chain", job_id, e);
                            metrics::SEPARATION_FALLBACKS
                                .with_label_values(&[e.kind()])
                                .inc();
                            record.push(
                                job_id,
                                StageOutcome::fallback(StageName::Probe, e.to_string(), started),
                            );
                            record.push(
                                job_id,
                                StageOutcome::skipped(StageName::Separate, "health check failed"),
                            );
                            JobState::Encode {
                                input: resolved.working_path.clone(),
                                chain: ChainVariant::Basic,
                            }
                        }
                    }
                }

                JobState::Separate => {
                    let started = Instant::now();
                    let output_dir = resolved.scratch_dir.join(SEPARATION_DIR);
                    match self
                        .separator
                        .separate(&resolved.working_path, &output_dir, &resolved.scratch_dir)
                        .await
                    {
                        Ok(tracks) => {
                            // Only the target stem feeds the encoder.
                            if let Some(residual) = &tracks.residual {
                                if let Err(e) = remove_path(residual).await {
                                    debug!("Job {}: residual stem not removed yet: {}", job_id, e);
                                }
                            }
                            record.push(
                                job_id,
                                StageOutcome::success(StageName::Separate, Some(&tracks.target), started),
                            );
                            JobState::Encode {
                                input: tracks.target,
                                chain: ChainVariant::Enhanced,
                            }
                        }
                        Err(e) => {
                            warn!("Job {}: separation failed ({}), using basic chain", job_id, e);
                            metrics::SEPARATION_FALLBACKS
                                .with_label_values(&[e.kind()])
                                .inc();
                            record.push(
                                job_id,
                                StageOutcome::fallback(StageName::Separate, e.to_string(), started),
                            );
                            // A failed run may leave a partial tree behind.
                            if let Err(e) = remove_path(&output_dir).await {
                                debug!("Job {}: partial separation output kept for sweep: {}", job_id, e);
                            }
                            JobState::Encode {
                                input: resolved.working_path.clone(),
                                chain: ChainVariant::Basic,
                            }
                        }
                    }
                }

                JobState::Encode { input, chain } => {
                    let started = Instant::now();
                    record.chain = Some(chain);
                    let encode_job = EncodeJob {
                        job_id: job_id.to_string(),
                        input_path: input,
                        output_path: resolved.temp_output_path.clone(),
                        filter_chain: FilterChain::for_variant(chain, &self.config.filters),
                        window: resolved.window,
                        format: self.format,
                        bitrate_kbps: self.config.target_bitrate_kbps,
                    };
                    match self.encoder.encode(&encode_job).await {
                        Ok(report) => {
                            debug!(
                                "Job {} encoded {} bytes with {:?} chain",
                                job_id, report.output_size_bytes, chain
                            );
                            record.push(
                                job_id,
                                StageOutcome::success(
                                    StageName::Encode,
                                    Some(&resolved.temp_output_path),
                                    started,
                                ),
                            );
                            JobState::Finalize
                        }
                        Err(e) => {
                            record.push(
                                job_id,
                                StageOutcome::failed(StageName::Encode, e.to_string(), started),
                            );
                            JobState::Failed(e.into())
                        }
                    }
                }

                JobState::Finalize => {
                    let started = Instant::now();
                    match finalize(&resolved.temp_output_path, &resolved.canonical_path).await {
                        Ok(()) => {
                            guard.disarm(&resolved.temp_output_path);
                            record.push(
                                job_id,
                                StageOutcome::success(
                                    StageName::Finalize,
                                    Some(&resolved.canonical_path),
                                    started,
                                ),
                            );
                            JobState::Done
                        }
                        Err(e) => {
                            record.push(
                                job_id,
                                StageOutcome::failed(StageName::Finalize, e.to_string(), started),
                            );
                            JobState::Failed(e.into())
                        }
                    }
                }

                JobState::Done => return Ok(()),
                JobState::Failed(e) => return Err(e),
            };
        }
    }

    /// Acquires with exponential backoff on transient failures. Returns the
    /// number of attempts used.
    async fn acquire_with_retry(
        &self,
        job_id: &str,
        source_ref: &str,
        destination: &Path,
    ) -> Result<u32, AcquireError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.acquirer.acquire(source_ref, destination).await {
                Ok(()) => return Ok(attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Job {}: acquisition attempt {}/{} failed: {}; retrying in {:?}",
                        job_id, attempt, max_attempts, e, delay
                    );
                    metrics::ACQUIRE_RETRIES.inc();
                    // Drop partial downloads before the next attempt.
                    if let Err(e) = remove_path(destination).await {
                        debug!("Job {}: could not clear partial download: {}", job_id, e);
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Promotes the encoded temp file to the canonical path without ever
/// replacing an existing file there.
///
/// A hard link is an exclusive create on the destination. Filesystems
/// without hard links get an existence check followed by a rename.
pub(crate) async fn finalize(temp: &Path, canonical: &Path) -> Result<(), FinalizeError> {
    if !is_nonempty_file(temp).await {
        return Err(FinalizeError::MissingTemp {
            path: temp.to_path_buf(),
        });
    }

    match tokio::fs::hard_link(temp, canonical).await {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(temp).await {
                warn!("Failed to remove temp output {}: {}", temp.display(), e);
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(FinalizeError::AlreadyExists {
                path: canonical.to_path_buf(),
            })
        }
        Err(e) => {
            debug!("Hard link failed ({}), falling back to rename", e);
            if tokio::fs::try_exists(canonical).await.unwrap_or(false) {
                return Err(FinalizeError::AlreadyExists {
                    path: canonical.to_path_buf(),
                });
            }
            tokio::fs::rename(temp, canonical)
                .await
                .map_err(|source| FinalizeError::Rename {
                    from: temp.to_path_buf(),
                    to: canonical.to_path_buf(),
                    source,
                })
        }
    }
}
