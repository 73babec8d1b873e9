//! Configuration for the external tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// All tool settings, as the `[tools]` config section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub acquire: AcquireConfig,
    #[serde(default)]
    pub separate: SeparateConfig,
    #[serde(default)]
    pub encode: EncodeConfig,
}

/// Configuration for the yt-dlp based acquirer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireConfig {
    /// Path to the yt-dlp binary.
    #[serde(default = "default_acquire_program")]
    pub program: PathBuf,

    /// Audio format to extract to (also the working file's extension).
    #[serde(default = "default_acquire_format")]
    pub audio_format: String,

    /// Timeout for a single acquisition attempt in seconds.
    #[serde(default = "default_acquire_timeout")]
    pub timeout_secs: u64,

    /// Additional arguments placed before the source reference.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Backoff for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry configuration for transient acquisition failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Sets the initial and maximum delays.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay_ms = initial.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    /// Delay before retry number `retry` (1-based), capped at the maximum.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(retry.saturating_sub(1) as i32);
        let millis = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

fn default_acquire_program() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_acquire_format() -> String {
    "wav".to_string()
}

fn default_acquire_timeout() -> u64 {
    600
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            program: default_acquire_program(),
            audio_format: default_acquire_format(),
            timeout_secs: default_acquire_timeout(),
            extra_args: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// Configuration for the demucs based separator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparateConfig {
    /// When false the health check always fails and every job takes the
    /// basic chain.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program to run (`demucs`, or an interpreter for a wrapper script).
    #[serde(default = "default_separate_program")]
    pub program: PathBuf,

    /// Arguments placed before demucs' own, e.g. a wrapper script path.
    #[serde(default)]
    pub prefix_args: Vec<String>,

    /// Model name; also the first directory level of the output tree.
    #[serde(default = "default_model")]
    pub model: String,

    /// Stem to isolate.
    #[serde(default = "default_stem")]
    pub stem: String,

    /// Timeout for one separation in seconds.
    #[serde(default = "default_separate_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the health check in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_separate_program() -> PathBuf {
    PathBuf::from("demucs")
}

fn default_model() -> String {
    "htdemucs".to_string()
}

fn default_stem() -> String {
    "vocals".to_string()
}

fn default_separate_timeout() -> u64 {
    1800
}

fn default_probe_timeout() -> u64 {
    15
}

impl Default for SeparateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_separate_program(),
            prefix_args: Vec::new(),
            model: default_model(),
            stem: default_stem(),
            timeout_secs: default_separate_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

/// Configuration for the FFmpeg based encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout for a single encode in seconds.
    #[serde(default = "default_encode_timeout")]
    pub timeout_secs: u64,

    /// Additional ffmpeg output arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_encode_timeout() -> u64 {
    600
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            log_level: default_log_level(),
            timeout_secs: default_encode_timeout(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodeConfig {
    /// Sets the ffmpeg path.
    pub fn with_ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.ffmpeg_path = path;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tools = ToolsConfig::default();
        assert_eq!(tools.acquire.program, PathBuf::from("yt-dlp"));
        assert_eq!(tools.acquire.audio_format, "wav");
        assert!(tools.separate.enabled);
        assert_eq!(tools.separate.model, "htdemucs");
        assert_eq!(tools.separate.stem, "vocals");
        assert_eq!(tools.encode.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let tools: ToolsConfig = toml::from_str(
            r#"
[separate]
program = "python3"
prefix_args = ["demucs_wrapper.py"]
"#,
        )
        .unwrap();
        assert_eq!(tools.separate.program, PathBuf::from("python3"));
        assert_eq!(tools.separate.prefix_args, vec!["demucs_wrapper.py"]);
        assert_eq!(tools.separate.timeout_secs, 1800);
        assert_eq!(tools.encode.timeout_secs, 600);
    }

    #[test]
    fn test_retry_backoff() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.delay_for(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(2), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(4000));
        assert_eq!(retry.delay_for(10), Duration::from_millis(30_000));
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }

    #[test]
    fn test_encode_builder() {
        let config = EncodeConfig::default()
            .with_ffmpeg_path(PathBuf::from("/opt/ffmpeg"))
            .with_timeout(30);
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.timeout_secs, 30);
    }
}
