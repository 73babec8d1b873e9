//! Per-job state machine.

use std::path::PathBuf;

use crate::stages::ChainVariant;

use super::error::PipelineError;

/// Where a job is. The coordinator advances it one stage completion at a
/// time until it reaches `Done` or `Failed`.
#[derive(Debug)]
pub(crate) enum JobState {
    Acquire,
    /// Health check of the separation toolchain.
    Probe,
    Separate,
    /// Encode `input` with the given chain.
    Encode {
        input: PathBuf,
        chain: ChainVariant,
    },
    Finalize,
    Done,
    Failed(PipelineError),
}

impl JobState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            JobState::Acquire => "acquire",
            JobState::Probe => "probe",
            JobState::Separate => "separate",
            JobState::Encode { .. } => "encode",
            JobState::Finalize => "finalize",
            JobState::Done => "done",
            JobState::Failed(_) => "failed",
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed(_))
    }
}
