//! FFmpeg-based encode stage.

use async_trait::async_trait;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

use super::config::EncodeConfig;
use super::error::EncodeError;
use super::invocation::{ProcessRunner, TokioProcessRunner, ToolInvocation};
use super::types::{EncodeJob, EncodeReport};

/// Applies a filter chain, trim window and bitrate to produce the final
/// compressed artifact.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Encodes `job.input_path` into `job.output_path`.
    async fn encode(&self, job: &EncodeJob) -> Result<EncodeReport, EncodeError>;

    /// Validates that the encoder is properly configured and ready.
    async fn validate(&self) -> Result<(), EncodeError>;
}

/// FFmpeg-based encoder implementation.
pub struct FfmpegEncoder {
    config: EncodeConfig,
    runner: std::sync::Arc<dyn ProcessRunner>,
}

impl FfmpegEncoder {
    /// Creates a new FFmpeg encoder with the given configuration.
    pub fn new(config: EncodeConfig) -> Self {
        Self::with_runner(config, std::sync::Arc::new(TokioProcessRunner))
    }

    /// Creates an encoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncodeConfig::default())
    }

    /// Creates an encoder with a custom process runner.
    pub fn with_runner(config: EncodeConfig, runner: std::sync::Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Builds the ffmpeg invocation for one encode.
    fn build_invocation(&self, job: &EncodeJob) -> ToolInvocation {
        let options = vec![
            "-ss".to_string(),
            format!("{:.3}", job.window.start_secs),
            "-t".to_string(),
            format!("{:.3}", job.window.duration_secs),
        ];

        let mut invocation = ToolInvocation::new(&self.config.ffmpeg_path)
            .args(["-y", "-hide_banner", "-nostdin"])
            // Input seeking: the window applies before filtering.
            .args(options)
            .arg("-i")
            .arg(&job.input_path)
            .arg("-vn");

        let chain = job.filter_chain.to_expression();
        if !chain.is_empty() {
            invocation = invocation.arg("-af").arg(chain);
        }

        invocation
            .args([
                "-c:a".to_string(),
                job.format.ffmpeg_codec().to_string(),
                "-b:a".to_string(),
                format!("{}k", job.bitrate_kbps),
                "-f".to_string(),
                job.format.ffmpeg_muxer().to_string(),
                "-loglevel".to_string(),
                self.config.log_level.clone(),
            ])
            .args(&self.config.extra_args)
            .arg(&job.output_path)
    }
}

/// Error lines from ffmpeg's stderr, or the whole tail if none match.
fn error_lines(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|l| l.contains("Error") || l.contains("error"))
        .collect();
    if lines.is_empty() {
        let trimmed = stderr.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    } else {
        Some(lines.join("\n"))
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode(&self, job: &EncodeJob) -> Result<EncodeReport, EncodeError> {
        let start = Instant::now();

        if !tokio::fs::try_exists(&job.input_path).await? {
            return Err(EncodeError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                EncodeError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        let invocation = self.build_invocation(job);
        let output = self
            .runner
            .run(&invocation, Duration::from_secs(self.config.timeout_secs))
            .await?;

        if !output.success {
            return Err(EncodeError::failed(
                format!("FFmpeg exited with code: {:?}", output.exit_code),
                error_lines(&output.stderr),
            ));
        }

        // Verify output exists and is non-empty
        let size = match tokio::fs::metadata(&job.output_path).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => {
                return Err(EncodeError::MissingOutput {
                    path: job.output_path.clone(),
                })
            }
        };

        debug!(
            "Encoded {} ({} bytes, chain {:?}) in {} ms",
            job.job_id,
            size,
            job.filter_chain.variant(),
            start.elapsed().as_millis()
        );

        Ok(EncodeReport {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: size,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), EncodeError> {
        let invocation = ToolInvocation::new(&self.config.ffmpeg_path).arg("-version");
        let output = self
            .runner
            .run(&invocation, Duration::from_secs(10))
            .await?;
        if !output.success {
            return Err(EncodeError::failed(
                "ffmpeg -version failed",
                output.stderr_opt(),
            ));
        }
        Ok(())
    }
}

/// Whether `path` is a non-empty regular file.
pub(crate) async fn is_nonempty_file(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(m) if m.is_file() && m.len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ExtractWindow, TrimWindow};
    use crate::stages::{AudioFormat, FilterChain, FilterSettings, ProcessError, ToolOutput};
    use crate::testing::MockProcessRunner;
    use std::ffi::OsStr;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn job(input: PathBuf, output: PathBuf) -> EncodeJob {
        EncodeJob {
            job_id: "job-1".to_string(),
            input_path: input,
            output_path: output,
            filter_chain: FilterChain::enhanced(&FilterSettings::default()),
            window: ExtractWindow::resolve(None, 90),
            format: AudioFormat::Mp3,
            bitrate_kbps: 64,
        }
    }

    fn write_output(inv: &ToolInvocation) {
        let out = PathBuf::from(inv.arg_list().last().unwrap());
        std::fs::write(out, b"ID3").unwrap();
    }

    #[test]
    fn test_build_args_mp3() {
        let encoder = FfmpegEncoder::with_defaults();
        let invocation = encoder.build_invocation(&job(
            PathBuf::from("/scratch/vocals.wav"),
            PathBuf::from("/storage/g/.song.abc.part.mp3"),
        ));

        assert_eq!(invocation.arg_after("-ss"), Some(OsStr::new("0.000")));
        assert_eq!(invocation.arg_after("-t"), Some(OsStr::new("90.000")));
        assert_eq!(invocation.arg_after("-i"), Some(OsStr::new("/scratch/vocals.wav")));
        assert_eq!(invocation.arg_after("-c:a"), Some(OsStr::new("libmp3lame")));
        assert_eq!(invocation.arg_after("-b:a"), Some(OsStr::new("64k")));
        assert_eq!(invocation.arg_after("-f"), Some(OsStr::new("mp3")));
        assert!(invocation.has_arg("-vn"));
        assert!(invocation
            .arg_after("-af")
            .unwrap()
            .to_string_lossy()
            .starts_with("silenceremove"));
        assert_eq!(
            invocation.arg_list().last().unwrap(),
            OsStr::new("/storage/g/.song.abc.part.mp3")
        );
    }

    #[test]
    fn test_window_precedes_input() {
        let encoder = FfmpegEncoder::with_defaults();
        let mut encode_job = job(PathBuf::from("/in.wav"), PathBuf::from("/out.mp3"));
        encode_job.window = ExtractWindow::resolve(Some(&TrimWindow::new(12.5, 42.5)), 90);
        encode_job.format = AudioFormat::Opus;
        let invocation = encoder.build_invocation(&encode_job);

        let args = invocation.arg_list();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(invocation.arg_after("-ss"), Some(OsStr::new("12.500")));
        assert_eq!(invocation.arg_after("-t"), Some(OsStr::new("30.000")));
        assert_eq!(invocation.arg_after("-c:a"), Some(OsStr::new("libopus")));
    }

    #[tokio::test]
    async fn test_encode_verifies_nonempty_output() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        let output = temp.path().join("out").join("song.mp3");

        let runner = MockProcessRunner::new();
        let encoder = FfmpegEncoder::with_runner(EncodeConfig::default(), Arc::new(runner.clone()));

        let result = encoder.encode(&job(input.clone(), output.clone())).await;
        assert!(matches!(result, Err(EncodeError::MissingOutput { .. })));

        runner.set_handler(|inv| {
            write_output(inv);
            Ok(ToolOutput::ok())
        });
        let report = encoder.encode(&job(input, output.clone())).await.unwrap();
        assert_eq!(report.output_size_bytes, 3);
        assert!(is_nonempty_file(&output).await);
    }

    #[tokio::test]
    async fn test_encode_missing_input() {
        let temp = TempDir::new().unwrap();
        let runner = MockProcessRunner::new();
        let encoder = FfmpegEncoder::with_runner(EncodeConfig::default(), Arc::new(runner.clone()));
        let result = encoder
            .encode(&job(temp.path().join("nope.wav"), temp.path().join("o.mp3")))
            .await;
        assert!(matches!(result, Err(EncodeError::InputNotFound { .. })));
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_encode_failure_keeps_error_lines() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let runner = MockProcessRunner::new();
        runner.set_handler(|_| {
            Ok(ToolOutput::failed(
                1,
                "Input #0, wav\nError while decoding stream #0:0\n",
            ))
        });
        let encoder = FfmpegEncoder::with_runner(EncodeConfig::default(), Arc::new(runner));
        match encoder.encode(&job(input, temp.path().join("o.mp3"))).await {
            Err(EncodeError::Failed { stderr, .. }) => {
                assert_eq!(stderr.as_deref(), Some("Error while decoding stream #0:0"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_missing_ffmpeg() {
        let runner = MockProcessRunner::new();
        runner.set_handler(|inv| {
            Err(ProcessError::NotFound {
                program: inv.program().to_path_buf(),
            })
        });
        let encoder = FfmpegEncoder::with_runner(EncodeConfig::default(), Arc::new(runner));
        assert!(matches!(
            encoder.validate().await,
            Err(EncodeError::FfmpegNotFound { .. })
        ));
    }
}
