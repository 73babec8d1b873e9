//! Configuration for batch runs.

use serde::{Deserialize, Serialize};

/// Batch settings, as the `[batch]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Jobs that may run at once. The default of one keeps separation work,
    /// the heaviest stage, strictly serial.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// Largest batch accepted.
    #[serde(default = "default_max_jobs")]
    pub max_jobs_per_batch: usize,
}

fn default_max_concurrent() -> usize {
    1
}

fn default_max_jobs() -> usize {
    100
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent(),
            max_jobs_per_batch: default_max_jobs(),
        }
    }
}

impl BatchConfig {
    /// Sets the concurrency bound.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Sets the batch size limit.
    pub fn with_max_jobs(mut self, max: usize) -> Self {
        self.max_jobs_per_batch = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.max_jobs_per_batch, 100);
    }

    #[test]
    fn test_config_builder() {
        let config = BatchConfig::default().with_max_concurrent(4).with_max_jobs(10);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.max_jobs_per_batch, 10);
    }
}
