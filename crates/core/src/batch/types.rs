//! Types for the batch module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::PipelineResult;
use crate::stages::ChainVariant;

/// Status of the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name.
    pub name: String,
    /// Number of running jobs.
    pub active_jobs: usize,
    /// Maximum concurrent jobs.
    pub max_concurrent: usize,
    /// Jobs waiting for a permit.
    pub queued_jobs: usize,
    /// Jobs finished since startup.
    pub total_processed: u64,
    /// Jobs failed since startup.
    pub total_failed: u64,
}

/// Per-job line of a batch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDiagnostic {
    pub job_id: String,
    pub source_ref: String,
    pub desired_output_identity: String,
    pub container_group: String,
    /// "success", "skipped" or "failed".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PipelineResult> for JobDiagnostic {
    fn from(result: &PipelineResult) -> Self {
        Self {
            job_id: result.job_id.clone(),
            source_ref: result.source_ref.clone(),
            desired_output_identity: result.desired_output_identity.clone(),
            container_group: result.container_group.clone(),
            status: result.result_label().to_string(),
            chain: result.chain,
            error: result.error.clone(),
        }
    }
}

/// Result of a batch that produced an archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Archive path relative to the storage root.
    pub archive_reference: PathBuf,
    /// Per-job results in completion order.
    pub results: Vec<PipelineResult>,
    /// Jobs with an artifact in the archive.
    pub succeeded: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Jobs skipped because the same identity was in flight elsewhere.
    pub in_flight: usize,
}

impl BatchOutcome {
    pub fn diagnostics(&self) -> Vec<JobDiagnostic> {
        self.results.iter().map(JobDiagnostic::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSpec;

    #[test]
    fn test_diagnostic_from_result() {
        let job = JobSpec::new("src", "Song", "Song (src)", "g");
        let result = PipelineResult::failed(&job, "abc", "Acquisition failed: gone");
        let diagnostic = JobDiagnostic::from(&result);
        assert_eq!(diagnostic.status, "failed");
        assert_eq!(diagnostic.error.as_deref(), Some("Acquisition failed: gone"));

        let json = serde_json::to_value(&diagnostic).unwrap();
        assert!(json.get("chain").is_none());
    }
}
