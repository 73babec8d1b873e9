//! Error types for identity resolution.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The job has nothing to fetch.
    #[error("Job has an empty source reference")]
    EmptySourceRef,

    /// No distinct working path could be found.
    #[error("No free working path for {name} in group {group}")]
    WorkingPathExhausted { group: String, name: String },

    /// Filesystem probe failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
