//! Mock encoder for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::stages::{EncodeError, EncodeJob, EncodeReport, Encoder};

/// Mock implementation of the Encoder trait.
///
/// Writes a non-empty file at the job's output path. Provides:
/// - Recorded jobs (filter chain and window included) for assertions
/// - Failure for jobs whose output path contains a pattern
/// - Simulated encode time
/// - Peak concurrency, for checking worker pool bounds
#[derive(Debug, Clone)]
pub struct MockEncoder {
    jobs: Arc<RwLock<Vec<EncodeJob>>>,
    fail_patterns: Arc<RwLock<Vec<String>>>,
    delay_ms: Arc<RwLock<u64>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create a new mock encoder.
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            fail_patterns: Arc::new(RwLock::new(Vec::new())),
            delay_ms: Arc::new(RwLock::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded encode jobs.
    pub async fn jobs(&self) -> Vec<EncodeJob> {
        self.jobs.read().await.clone()
    }

    /// Get the number of encodes attempted.
    pub async fn encode_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Fail every encode whose output path contains `pattern`.
    pub async fn fail_when_output_contains(&self, pattern: impl Into<String>) {
        self.fail_patterns.write().await.push(pattern.into());
    }

    /// Set the simulated encode duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Highest number of encodes that ran at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn should_fail(&self, job: &EncodeJob) -> bool {
        let output = job.output_path.to_string_lossy();
        self.fail_patterns
            .read()
            .await
            .iter()
            .any(|p| output.contains(p.as_str()))
    }
}

/// Decrements the active counter when an encode ends, however it ends.
struct ActiveSlot(Arc<AtomicUsize>);

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn encode(&self, job: &EncodeJob) -> Result<EncodeReport, EncodeError> {
        let start = Instant::now();
        self.jobs.write().await.push(job.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _slot = ActiveSlot(Arc::clone(&self.active));
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        let delay_ms = *self.delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if !tokio::fs::try_exists(&job.input_path).await? {
            return Err(EncodeError::InputNotFound {
                path: job.input_path.clone(),
            });
        }
        if self.should_fail(job).await {
            return Err(EncodeError::failed(
                "mock encode failure",
                Some("Error while decoding stream".to_string()),
            ));
        }

        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = format!("mock-{}-{}", job.job_id, job.filter_chain.to_expression());
        tokio::fs::write(&job.output_path, body.as_bytes()).await?;

        Ok(EncodeReport {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: body.len() as u64,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), EncodeError> {
        Ok(())
    }
}
