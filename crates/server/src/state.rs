use std::sync::Arc;
use stemcut_core::{
    ArchiveAggregator, BatchScheduler, Config, PipelineCoordinator, PoolStatus, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    scheduler: Arc<BatchScheduler>,
}

impl AppState {
    pub fn new(config: Config, scheduler: Arc<BatchScheduler>) -> Self {
        Self { config, scheduler }
    }

    /// Builds the real pipeline (yt-dlp, demucs, ffmpeg) from configuration.
    pub fn from_config(config: Config) -> Self {
        let coordinator = PipelineCoordinator::from_config(&config);
        let aggregator =
            ArchiveAggregator::new(&config.storage.root, config.storage.archive_dir.clone());
        let scheduler = BatchScheduler::new(Arc::new(coordinator), aggregator, config.batch.clone());
        Self::new(config, Arc::new(scheduler))
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        self.scheduler.as_ref()
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.scheduler.status()
    }
}
