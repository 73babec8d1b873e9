//! Error types for the archive module.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Nothing to archive.
    #[error("No artifacts to archive")]
    NoEntries,

    /// An artifact vanished before it could be archived.
    #[error("Artifact missing: {path}")]
    MissingInput { path: PathBuf },

    /// Zip encoding failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The blocking writer task did not complete.
    #[error("Archive writer task failed: {0}")]
    Writer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
