use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::batch::BatchConfig;
use crate::pipeline::PipelineConfig;
use crate::stages::{AudioFormat, ToolsConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Storage layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root holding one directory per container group.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Per-job scratch, relative to the root.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Batch archives, relative to the root.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// Format of canonical artifacts.
    #[serde(default)]
    pub output_format: AudioFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            scratch_dir: default_scratch_dir(),
            archive_dir: default_archive_dir(),
            output_format: AudioFormat::default(),
        }
    }
}

impl StorageConfig {
    pub fn scratch_root(&self) -> PathBuf {
        self.root.join(&self.scratch_dir)
    }

    pub fn archive_root(&self) -> PathBuf {
        self.root.join(&self.archive_dir)
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_scratch_dir() -> String {
    ".scratch".to_string()
}

fn default_archive_dir() -> String {
    "archives".to_string()
}

/// Sanitized config for API responses (tool arguments redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tools: SanitizedToolsConfig,
    pub pipeline: PipelineConfig,
    pub batch: BatchConfig,
}

/// Tool settings without their free-form arguments, which may carry
/// cookies or credentials.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedToolsConfig {
    pub acquire_program: String,
    pub acquire_format: String,
    pub acquire_timeout_secs: u64,
    pub acquire_max_attempts: u32,
    pub acquire_extra_args: usize,
    pub separation_enabled: bool,
    pub separation_program: String,
    pub separation_model: String,
    pub separation_stem: String,
    pub separation_timeout_secs: u64,
    pub ffmpeg_path: String,
    pub encode_timeout_secs: u64,
    pub encode_extra_args: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let tools = &config.tools;
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            tools: SanitizedToolsConfig {
                acquire_program: tools.acquire.program.display().to_string(),
                acquire_format: tools.acquire.audio_format.clone(),
                acquire_timeout_secs: tools.acquire.timeout_secs,
                acquire_max_attempts: tools.acquire.retry.max_attempts,
                acquire_extra_args: tools.acquire.extra_args.len(),
                separation_enabled: tools.separate.enabled,
                separation_program: tools.separate.program.display().to_string(),
                separation_model: tools.separate.model.clone(),
                separation_stem: tools.separate.stem.clone(),
                separation_timeout_secs: tools.separate.timeout_secs,
                ffmpeg_path: tools.encode.ffmpeg_path.display().to_string(),
                encode_timeout_secs: tools.encode.timeout_secs,
                encode_extra_args: tools.encode.extra_args.len(),
            },
            pipeline: config.pipeline.clone(),
            batch: config.batch.clone(),
        }
    }
}
