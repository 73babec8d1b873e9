//! Error types for the pipeline coordinator.

use std::path::PathBuf;
use thiserror::Error;

use crate::identity::IdentityError;
use crate::stages::{AcquireError, EncodeError};

/// Errors from promoting an encoded temp file to its canonical path.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Something else produced the canonical artifact first.
    #[error("Canonical artifact already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// The encoded temp file is gone or empty.
    #[error("Encoded output missing before finalize: {path}")]
    MissingTemp { path: PathBuf },

    /// The rename itself failed.
    #[error("Failed to move {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Job-fatal errors. Separation failures never show up here; they are
/// absorbed into a fallback stage outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Identity resolution failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquireError),

    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Finalize failed: {0}")]
    Finalize(#[from] FinalizeError),

    /// The job task panicked or was aborted.
    #[error("Job aborted: {reason}")]
    Aborted { reason: String },
}

impl PipelineError {
    /// Whether running the same job again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Acquisition(e) => e.is_retryable(),
            Self::Encode(EncodeError::Timeout { .. }) => true,
            Self::Aborted { .. } => true,
            _ => false,
        }
    }

    /// Short label of the failed phase, for diagnostics.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Identity(_) => "resolve",
            Self::Acquisition(_) => "acquire",
            Self::Encode(_) => "encode",
            Self::Finalize(_) => "finalize",
            Self::Aborted { .. } => "aborted",
        }
    }
}
