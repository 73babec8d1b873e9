//! Mock acquirer for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::stages::{AcquireError, Acquirer};

/// A recorded acquisition for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAcquisition {
    pub source_ref: String,
    pub destination: PathBuf,
    pub success: bool,
}

/// Mock implementation of the Acquirer trait.
///
/// Writes a small fake audio file at the destination. Provides:
/// - Recorded calls for assertions
/// - Permanent failure per source reference
/// - A number of upcoming transient (retryable) failures
/// - Simulated download time
#[derive(Debug, Clone)]
pub struct MockAcquirer {
    calls: Arc<RwLock<Vec<RecordedAcquisition>>>,
    unavailable: Arc<RwLock<HashSet<String>>>,
    transient_failures: Arc<RwLock<u32>>,
    skip_write: Arc<RwLock<bool>>,
    delay_ms: Arc<RwLock<u64>>,
}

impl Default for MockAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAcquirer {
    /// Create a new mock acquirer.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            unavailable: Arc::new(RwLock::new(HashSet::new())),
            transient_failures: Arc::new(RwLock::new(0)),
            skip_write: Arc::new(RwLock::new(false)),
            delay_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded acquisitions.
    pub async fn calls(&self) -> Vec<RecordedAcquisition> {
        self.calls.read().await.clone()
    }

    /// Get the number of acquisitions attempted.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Make every acquisition of `source_ref` fail permanently.
    pub async fn fail_source(&self, source_ref: impl Into<String>) {
        self.unavailable.write().await.insert(source_ref.into());
    }

    /// Make the next `count` acquisitions fail with a network error.
    pub async fn fail_next_transient(&self, count: u32) {
        *self.transient_failures.write().await = count;
    }

    /// Report success without writing the file.
    pub async fn set_skip_write(&self, skip: bool) {
        *self.skip_write.write().await = skip;
    }

    /// Set the simulated download duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }

    async fn record(&self, source_ref: &str, destination: &Path, success: bool) {
        self.calls.write().await.push(RecordedAcquisition {
            source_ref: source_ref.to_string(),
            destination: destination.to_path_buf(),
            success,
        });
    }

    async fn take_transient(&self) -> bool {
        let mut remaining = self.transient_failures.write().await;
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl Acquirer for MockAcquirer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn acquire(&self, source_ref: &str, destination: &Path) -> Result<(), AcquireError> {
        if self.unavailable.read().await.contains(source_ref) {
            self.record(source_ref, destination, false).await;
            return Err(AcquireError::SourceUnavailable {
                reason: format!("{} is private", source_ref),
            });
        }

        if self.take_transient().await {
            self.record(source_ref, destination, false).await;
            return Err(AcquireError::Network {
                reason: "connection reset by peer".to_string(),
            });
        }

        let delay_ms = *self.delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if !*self.skip_write.read().await {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(destination, b"RIFF-mock-audio").await?;
        }

        self.record(source_ref, destination, true).await;
        Ok(())
    }
}
