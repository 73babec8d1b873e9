//! Mock separator for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::stages::{SeparateError, SeparatedTracks, Separator};

/// A recorded separation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSeparation {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub success: bool,
}

/// Mock implementation of the Separator trait.
///
/// Writes a target and a residual stem in the same layout demucs uses
/// (`<output_dir>/mock/<input_stem>/`).
#[derive(Debug, Clone)]
pub struct MockSeparator {
    available: Arc<RwLock<bool>>,
    fail: Arc<RwLock<bool>>,
    probes: Arc<RwLock<usize>>,
    separations: Arc<RwLock<Vec<RecordedSeparation>>>,
}

impl Default for MockSeparator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSeparator {
    /// Create a new mock separator that is available and succeeds.
    pub fn new() -> Self {
        Self {
            available: Arc::new(RwLock::new(true)),
            fail: Arc::new(RwLock::new(false)),
            probes: Arc::new(RwLock::new(0)),
            separations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a mock whose health check fails.
    pub fn unavailable() -> Self {
        let mut separator = Self::new();
        separator.available = Arc::new(RwLock::new(false));
        separator
    }

    /// Set whether the health check passes.
    pub async fn set_available(&self, available: bool) {
        *self.available.write().await = available;
    }

    /// Make separations fail after a passing health check.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Number of health checks performed.
    pub async fn probe_count(&self) -> usize {
        *self.probes.read().await
    }

    /// Get all recorded separations.
    pub async fn separations(&self) -> Vec<RecordedSeparation> {
        self.separations.read().await.clone()
    }

    /// Number of separations attempted.
    pub async fn separation_count(&self) -> usize {
        self.separations.read().await.len()
    }
}

#[async_trait]
impl Separator for MockSeparator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self) -> Result<(), SeparateError> {
        *self.probes.write().await += 1;
        if *self.available.read().await {
            Ok(())
        } else {
            Err(SeparateError::Unavailable {
                reason: "mock separator unavailable".to_string(),
            })
        }
    }

    async fn separate(
        &self,
        input: &Path,
        output_dir: &Path,
        _scratch_dir: &Path,
    ) -> Result<SeparatedTracks, SeparateError> {
        let fail = *self.fail.read().await;
        self.separations.write().await.push(RecordedSeparation {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            success: !fail,
        });

        if fail {
            return Err(SeparateError::Failed {
                reason: "mock separation failure".to_string(),
                stderr: None,
            });
        }
        if !tokio::fs::try_exists(input).await? {
            return Err(SeparateError::Failed {
                reason: format!("input missing: {}", input.display()),
                stderr: None,
            });
        }

        let base = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let track_dir = output_dir.join("mock").join(base);
        tokio::fs::create_dir_all(&track_dir).await?;

        let target = track_dir.join("vocals.wav");
        let residual = track_dir.join("no_vocals.wav");
        tokio::fs::write(&target, b"RIFF-mock-vocals").await?;
        tokio::fs::write(&residual, b"RIFF-mock-rest").await?;

        Ok(SeparatedTracks {
            target,
            residual: Some(residual),
        })
    }
}
