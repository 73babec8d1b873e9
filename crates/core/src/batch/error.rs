//! Error types for batch runs.

use thiserror::Error;

use crate::archive::ArchiveError;

use super::types::JobDiagnostic;

#[derive(Debug, Error)]
pub enum BatchError {
    /// The request carried no jobs.
    #[error("Batch contains no jobs")]
    NoJobs,

    /// The request exceeds the configured batch size.
    #[error("Batch of {count} jobs exceeds the limit of {max}")]
    TooManyJobs { count: usize, max: usize },

    /// Every job failed; no archive was written.
    #[error("No job in the batch produced an artifact ({} jobs)", .diagnostics.len())]
    Empty { diagnostics: Vec<JobDiagnostic> },

    /// Artifacts exist but could not be bundled.
    #[error("Archive failed: {0}")]
    Archive(#[from] ArchiveError),
}

impl BatchError {
    /// Whether the request itself was malformed.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::NoJobs | Self::TooManyJobs { .. })
    }
}
