//! Types for the stage executors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::ExtractWindow;

use super::filters::FilterChain;

/// Lossy output formats the encode stage can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    #[default]
    Mp3,
    OggVorbis,
    Opus,
    Aac,
}

impl AudioFormat {
    /// The ffmpeg encoder name.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::OggVorbis => "libvorbis",
            AudioFormat::Opus => "libopus",
            AudioFormat::Aac => "aac",
        }
    }

    /// The ffmpeg muxer. Set explicitly because temp outputs carry a
    /// `.part` marker in their names.
    pub fn ffmpeg_muxer(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::OggVorbis => "ogg",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "ipod",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::OggVorbis => "ogg",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "m4a",
        }
    }
}

/// Output of a successful separation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparatedTracks {
    /// The isolated target stem.
    pub target: PathBuf,
    /// Everything except the target stem, if the tool wrote it.
    pub residual: Option<PathBuf>,
}

/// One encode invocation.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub job_id: String,
    pub input_path: PathBuf,
    /// Temporary output; the caller renames it into place.
    pub output_path: PathBuf,
    pub filter_chain: FilterChain,
    pub window: ExtractWindow,
    pub format: AudioFormat,
    pub bitrate_kbps: u32,
}

/// Result of a successful encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeReport {
    pub job_id: String,
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codecs() {
        assert_eq!(AudioFormat::Mp3.ffmpeg_codec(), "libmp3lame");
        assert_eq!(AudioFormat::Aac.extension(), "m4a");
        assert_eq!(AudioFormat::Aac.ffmpeg_muxer(), "ipod");
        assert_eq!(AudioFormat::default(), AudioFormat::Mp3);
    }

    #[test]
    fn test_format_serde() {
        let format: AudioFormat = serde_json::from_str("\"ogg_vorbis\"").unwrap();
        assert_eq!(format, AudioFormat::OggVorbis);
        assert_eq!(serde_json::to_string(&AudioFormat::Opus).unwrap(), "\"opus\"");
    }
}
