//! Stage executors: the external tools a job runs through.
//!
//! Every stage is an opaque out-of-process invocation behind a trait:
//!
//! - [`Acquirer`]: fetch raw audio for a source reference (yt-dlp)
//! - [`Separator`]: best-effort isolation of a target stem (demucs)
//! - [`Encoder`]: filter chain, trim window and bitrate re-encode (ffmpeg)
//!
//! Tools are spawned from a typed [`ToolInvocation`] through a
//! [`ProcessRunner`]; arguments are passed as a vector and never joined into
//! a shell string.
//!
//! # Example
//!
//! ```ignore
//! use stemcut_core::stages::{FfmpegEncoder, EncodeConfig, EncodeJob, FilterChain, Encoder};
//!
//! let encoder = FfmpegEncoder::new(EncodeConfig::default());
//! encoder.validate().await?;
//!
//! let report = encoder.encode(&EncodeJob {
//!     job_id: "job-1".to_string(),
//!     input_path: PathBuf::from("/scratch/vocals.wav"),
//!     output_path: PathBuf::from("/storage/group/.song.part.mp3"),
//!     filter_chain: FilterChain::basic(&FilterSettings::default()),
//!     window: ExtractWindow::resolve(None, 90),
//!     format: AudioFormat::Mp3,
//!     bitrate_kbps: 64,
//! }).await?;
//! ```

mod acquire;
mod config;
mod encode;
mod error;
mod filters;
mod invocation;
mod separate;
mod types;

pub use acquire::{classify_acquire_failure, Acquirer, YtDlpAcquirer};
pub use config::{AcquireConfig, EncodeConfig, RetryConfig, SeparateConfig, ToolsConfig};
pub use encode::{Encoder, FfmpegEncoder};
pub(crate) use encode::is_nonempty_file;
pub use error::{AcquireError, EncodeError, ProcessError, SeparateError};
pub use filters::{AudioFilter, ChainVariant, FilterChain, FilterSettings};
pub use invocation::{ProcessRunner, TokioProcessRunner, ToolInvocation, ToolOutput};
pub use separate::{DemucsSeparator, Separator};
pub use types::{AudioFormat, EncodeJob, EncodeReport, SeparatedTracks};
