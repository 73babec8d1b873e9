pub mod archive;
pub mod batch;
pub mod config;
pub mod identity;
pub mod janitor;
pub mod job;
pub mod metrics;
pub mod pipeline;
pub mod stages;
pub mod testing;

pub use archive::{ArchiveAggregator, ArchiveError};
pub use batch::{
    BatchConfig, BatchError, BatchOutcome, BatchScheduler, JobDiagnostic, PoolStatus, WorkerPool,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use identity::{IdentityError, IdentityResolver, Resolution, SkipReason};
pub use job::{derive_job_id, ExtractWindow, JobSpec, TrimWindow};
pub use pipeline::{
    PipelineConfig, PipelineCoordinator, PipelineError, PipelineResult, StageName, StageOutcome,
    StageStatus,
};
pub use stages::{AudioFormat, ChainVariant, FilterChain};
