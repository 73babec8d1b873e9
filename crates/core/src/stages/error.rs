//! Error types for the stage executors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from spawning or waiting on an external tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be found.
    #[error("Program not found: {program}")]
    NotFound { program: PathBuf },

    /// The program did not exit in time and was killed.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: PathBuf, timeout_secs: u64 },

    /// Spawn or wait failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the acquisition stage. Always fatal to the job.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The source is gone, private or unsupported. Retrying will not help.
    #[error("Source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    /// A network-level failure that may succeed on retry.
    #[error("Network failure: {reason}")]
    Network { reason: String },

    /// The acquisition tool exited with an unrecognized failure.
    #[error("Acquisition failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// Acquisition tool binary not found.
    #[error("Acquisition tool not found: {program}")]
    ToolNotFound { program: PathBuf },

    /// The tool exceeded its timeout.
    #[error("Acquisition timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The tool exited cleanly without producing the expected file.
    #[error("Acquisition produced no file at {path}")]
    MissingOutput { path: PathBuf },

    /// I/O error around the invocation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

impl From<ProcessError> for AcquireError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound { program } => Self::ToolNotFound { program },
            ProcessError::Timeout { timeout_secs, .. } => Self::Timeout { timeout_secs },
            ProcessError::Io(e) => Self::Io(e),
        }
    }
}

/// Errors from the separation stage. Never fatal: the job falls back to the
/// basic filter chain.
#[derive(Debug, Error)]
pub enum SeparateError {
    /// The toolchain is missing, disabled or failed its health check.
    #[error("Separation unavailable: {reason}")]
    Unavailable { reason: String },

    /// The invocation ran and failed.
    #[error("Separation failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// The tool exceeded its timeout.
    #[error("Separation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The tool exited cleanly but the expected stem is missing.
    #[error("Separation produced no stem at {path}")]
    MissingOutput { path: PathBuf },

    /// I/O error (alias creation, output inspection).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SeparateError {
    /// Short label for metrics and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Failed { .. } | Self::MissingOutput { .. } => "failed",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
        }
    }
}

impl From<ProcessError> for SeparateError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound { program } => Self::Unavailable {
                reason: format!("{} not found", program.display()),
            },
            ProcessError::Timeout { timeout_secs, .. } => Self::Timeout { timeout_secs },
            ProcessError::Io(e) => Self::Io(e),
        }
    }
}

/// Errors from the encode stage. Always fatal to the job.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// Encode process failed.
    #[error("Encode failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encode timed out.
    #[error("Encode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// FFmpeg exited cleanly but the output is missing or empty.
    #[error("Encode produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// I/O error during encode.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    /// Creates an encode failure with captured stderr.
    pub fn failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            stderr,
        }
    }
}

impl From<ProcessError> for EncodeError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound { program } => Self::FfmpegNotFound { path: program },
            ProcessError::Timeout { timeout_secs, .. } => Self::Timeout { timeout_secs },
            ProcessError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_retryable() {
        assert!(AcquireError::Network { reason: "reset".into() }.is_retryable());
        assert!(AcquireError::Timeout { timeout_secs: 5 }.is_retryable());
        assert!(!AcquireError::SourceUnavailable { reason: "private".into() }.is_retryable());
        assert!(!AcquireError::ToolNotFound { program: "yt-dlp".into() }.is_retryable());
    }

    #[test]
    fn test_process_error_mapping() {
        let acquire: AcquireError = ProcessError::NotFound { program: "yt-dlp".into() }.into();
        assert!(matches!(acquire, AcquireError::ToolNotFound { .. }));

        let separate: SeparateError = ProcessError::NotFound { program: "demucs".into() }.into();
        assert_eq!(separate.kind(), "unavailable");

        let separate: SeparateError = ProcessError::Timeout {
            program: "demucs".into(),
            timeout_secs: 10,
        }
        .into();
        assert_eq!(separate.kind(), "timeout");
    }
}
