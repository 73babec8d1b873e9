//! Acquisition stage: fetch raw audio for a source reference.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::config::AcquireConfig;
use super::error::AcquireError;
use super::invocation::{ProcessRunner, TokioProcessRunner, ToolInvocation, ToolOutput};

/// Stderr patterns for sources that will never download.
static PERMANENT_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(video unavailable|private video|has been removed|is not available|no longer available|unsupported url|does not exist|account .*terminated|copyright claim|http error 404|http error 410)",
    )
    .unwrap()
});

/// Stderr patterns for failures worth retrying.
static TRANSIENT_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(timed out|connection (reset|refused|aborted)|temporary failure|network is unreachable|name resolution|http error 5\d\d|http error 429|unable to download webpage|incompleteread|ssl)",
    )
    .unwrap()
});

/// Fetches raw audio into a working path.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Returns the name of this acquirer implementation.
    fn name(&self) -> &str;

    /// Writes exactly one audio file at `destination`, or fails.
    async fn acquire(&self, source_ref: &str, destination: &Path) -> Result<(), AcquireError>;
}

/// Maps a failed acquisition's stderr onto the error taxonomy.
pub fn classify_acquire_failure(output: &ToolOutput) -> AcquireError {
    let stderr = output.stderr.as_str();
    let reason = stderr
        .lines()
        .rev()
        .find(|l| l.to_ascii_lowercase().contains("error"))
        .unwrap_or("no error output")
        .trim()
        .to_string();

    if PERMANENT_FAILURE.is_match(stderr) {
        AcquireError::SourceUnavailable { reason }
    } else if TRANSIENT_FAILURE.is_match(stderr) {
        AcquireError::Network { reason }
    } else {
        AcquireError::Failed {
            reason: format!("exit code {:?}: {}", output.exit_code, reason),
            stderr: output.stderr_opt(),
        }
    }
}

/// yt-dlp based acquirer.
pub struct YtDlpAcquirer {
    config: AcquireConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl YtDlpAcquirer {
    /// Creates an acquirer that spawns real processes.
    pub fn new(config: AcquireConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner))
    }

    /// Creates an acquirer with a custom process runner.
    pub fn with_runner(config: AcquireConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Builds the invocation for one acquisition.
    ///
    /// yt-dlp names its output from a template, so the destination's stem is
    /// escaped and given a `%(ext)s` suffix; with audio extraction the final
    /// file lands at `<stem>.<audio_format>`.
    fn build_invocation(&self, source_ref: &str, destination: &Path) -> ToolInvocation {
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().replace('%', "%%"))
            .unwrap_or_else(|| "download".to_string());
        let template = destination
            .with_file_name(format!("{}.%(ext)s", stem))
            .into_os_string();

        let mut args: Vec<OsString> = vec![
            "--no-playlist".into(),
            "--no-progress".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            self.config.audio_format.clone().into(),
            "--output".into(),
            template,
        ];
        args.extend(self.config.extra_args.iter().map(OsString::from));
        // Everything after the terminator is a positional URL, never an option.
        args.push("--".into());
        args.push(source_ref.into());

        ToolInvocation::new(&self.config.program).args(args)
    }
}

#[async_trait]
impl Acquirer for YtDlpAcquirer {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn acquire(&self, source_ref: &str, destination: &Path) -> Result<(), AcquireError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let invocation = self.build_invocation(source_ref, destination);
        let output = self
            .runner
            .run(&invocation, Duration::from_secs(self.config.timeout_secs))
            .await?;

        if !output.success {
            return Err(classify_acquire_failure(&output));
        }

        if !tokio::fs::try_exists(destination).await? {
            return Err(AcquireError::MissingOutput {
                path: destination.to_path_buf(),
            });
        }

        debug!(
            "Acquired {} into {} in {} ms",
            source_ref,
            destination.display(),
            output.duration_ms
        );
        Ok(())
    }
}
