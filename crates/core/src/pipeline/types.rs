//! Types for the pipeline module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::identity::SkipReason;
use crate::job::JobSpec;
use crate::stages::ChainVariant;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Acquire,
    Probe,
    Separate,
    Encode,
    Finalize,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Acquire => "acquire",
            StageName::Probe => "probe",
            StageName::Separate => "separate",
            StageName::Encode => "encode",
            StageName::Finalize => "finalize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    /// The stage did not deliver, and the job continued on the reduced path.
    Fallback,
    Failed,
    /// The stage was never invoked.
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Success => "success",
            StageStatus::Fallback => "fallback",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

/// Record of one stage of one job. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    stage: StageName,
    status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    produced_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<String>,
    duration_ms: u64,
}

impl StageOutcome {
    fn new(
        stage: StageName,
        status: StageStatus,
        produced_path: Option<PathBuf>,
        diagnostic: Option<String>,
        started: Option<Instant>,
    ) -> Self {
        Self {
            stage,
            status,
            produced_path,
            diagnostic,
            duration_ms: started.map(|s| s.elapsed().as_millis() as u64).unwrap_or(0),
        }
    }

    pub fn success(stage: StageName, produced: Option<&Path>, started: Instant) -> Self {
        Self::new(
            stage,
            StageStatus::Success,
            produced.map(Path::to_path_buf),
            None,
            Some(started),
        )
    }

    pub fn fallback(stage: StageName, diagnostic: impl Into<String>, started: Instant) -> Self {
        Self::new(
            stage,
            StageStatus::Fallback,
            None,
            Some(diagnostic.into()),
            Some(started),
        )
    }

    pub fn failed(stage: StageName, diagnostic: impl Into<String>, started: Instant) -> Self {
        Self::new(
            stage,
            StageStatus::Failed,
            None,
            Some(diagnostic.into()),
            Some(started),
        )
    }

    pub fn skipped(stage: StageName, diagnostic: impl Into<String>) -> Self {
        Self::new(
            stage,
            StageStatus::Skipped,
            None,
            Some(diagnostic.into()),
            None,
        )
    }

    /// Attaches a diagnostic note to a successful outcome.
    pub(crate) fn with_note(mut self, note: impl Into<String>) -> Self {
        self.diagnostic = Some(note.into());
        self
    }

    pub fn stage(&self) -> StageName {
        self.stage
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn produced_path(&self) -> Option<&Path> {
        self.produced_path.as_deref()
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// Result of running one job through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub job_id: String,
    pub source_ref: String,
    pub desired_output_identity: String,
    pub container_group: String,
    /// Where the artifact lives or would live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_path: Option<PathBuf>,
    /// Stage outcomes in execution order.
    pub stages: Vec<StageOutcome>,
    /// Chain the encode stage ran with, if it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainVariant>,
    /// The final artifact, if one exists after this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl PipelineResult {
    /// An empty result for `job`; the coordinator fills in the rest.
    pub fn new(job: &JobSpec, job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            source_ref: job.source_ref.clone(),
            desired_output_identity: job.desired_output_identity.clone(),
            container_group: job.container_group.clone(),
            canonical_path: None,
            stages: Vec::new(),
            chain: None,
            artifact: None,
            skipped: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// A failed result with no stage outcomes.
    pub fn failed(job: &JobSpec, job_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(job, job_id);
        result.error = Some(error.into());
        result
    }

    /// Whether an artifact exists for this job.
    pub fn is_success(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// The outcome recorded for `stage`, if any.
    pub fn stage(&self, stage: StageName) -> Option<&StageOutcome> {
        self.stages.iter().find(|o| o.stage() == stage)
    }

    /// Label for metrics.
    pub fn result_label(&self) -> &'static str {
        if self.is_failed() {
            "failed"
        } else if self.is_skipped() {
            "skipped"
        } else {
            "success"
        }
    }
}
