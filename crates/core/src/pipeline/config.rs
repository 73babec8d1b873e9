//! Configuration for the pipeline coordinator.

use serde::{Deserialize, Serialize};

use crate::stages::FilterSettings;

/// Per-job processing settings, as the `[pipeline]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bitrate of the final artifact in kbps.
    #[serde(default = "default_bitrate")]
    pub target_bitrate_kbps: u32,

    /// Length of the extracted window when a job has no valid trim window.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,

    /// Filter chain tunables.
    #[serde(default)]
    pub filters: FilterSettings,
}

fn default_bitrate() -> u32 {
    64
}

fn default_max_duration() -> u64 {
    90
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_bitrate_kbps: default_bitrate(),
            max_duration_secs: default_max_duration(),
            filters: FilterSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Sets the target bitrate.
    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.target_bitrate_kbps = kbps;
        self
    }

    /// Sets the duration cap.
    pub fn with_max_duration(mut self, secs: u64) -> Self {
        self.max_duration_secs = secs;
        self
    }
}
