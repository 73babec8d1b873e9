//! Audio filter chains for the encode stage.
//!
//! Two variants exist. The enhanced chain runs on a separated stem and trims
//! silence before any spectral or dynamics processing, so noise reduction,
//! compression and gain all see the trimmed signal. The basic chain runs on
//! the unseparated mix and never trims.

use serde::{Deserialize, Serialize};

/// Which chain a job was encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainVariant {
    /// Separation succeeded.
    Enhanced,
    /// Separation unavailable or failed.
    Basic,
}

/// Tunables for both chains, as the `[pipeline.filters]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    /// First silence-trim pass threshold in dB.
    #[serde(default = "default_trim_threshold")]
    pub trim_threshold_db: f64,

    /// Second, stricter silence-trim pass threshold in dB.
    #[serde(default = "default_strict_trim_threshold")]
    pub strict_trim_threshold_db: f64,

    /// Minimum silence length removed by the trim passes, in seconds.
    #[serde(default = "default_min_silence")]
    pub min_silence_secs: f64,

    /// Noise floor for FFT denoising in dB.
    #[serde(default = "default_noise_floor")]
    pub noise_floor_db: f64,

    #[serde(default = "default_compressor_threshold")]
    pub compressor_threshold_db: f64,

    #[serde(default = "default_compressor_ratio")]
    pub compressor_ratio: f64,

    #[serde(default = "default_compressor_attack")]
    pub compressor_attack_ms: f64,

    #[serde(default = "default_compressor_release")]
    pub compressor_release_ms: f64,

    /// Linear gain applied by the volume filter.
    #[serde(default = "default_gain")]
    pub gain: f64,

    /// Optional final resample for the enhanced chain.
    #[serde(default)]
    pub resample_hz: Option<u32>,
}

fn default_trim_threshold() -> f64 {
    -50.0
}

fn default_strict_trim_threshold() -> f64 {
    -40.0
}

fn default_min_silence() -> f64 {
    0.5
}

fn default_noise_floor() -> f64 {
    -25.0
}

fn default_compressor_threshold() -> f64 {
    -18.0
}

fn default_compressor_ratio() -> f64 {
    3.0
}

fn default_compressor_attack() -> f64 {
    20.0
}

fn default_compressor_release() -> f64 {
    250.0
}

fn default_gain() -> f64 {
    1.5
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            trim_threshold_db: default_trim_threshold(),
            strict_trim_threshold_db: default_strict_trim_threshold(),
            min_silence_secs: default_min_silence(),
            noise_floor_db: default_noise_floor(),
            compressor_threshold_db: default_compressor_threshold(),
            compressor_ratio: default_compressor_ratio(),
            compressor_attack_ms: default_compressor_attack(),
            compressor_release_ms: default_compressor_release(),
            gain: default_gain(),
            resample_hz: None,
        }
    }
}

/// One ffmpeg audio filter.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFilter {
    SilenceTrim {
        threshold_db: f64,
        min_silence_secs: f64,
    },
    NoiseReduction {
        noise_floor_db: f64,
    },
    Compressor {
        threshold_db: f64,
        ratio: f64,
        attack_ms: f64,
        release_ms: f64,
    },
    Gain {
        volume: f64,
    },
    Resample {
        rate_hz: u32,
    },
}

impl AudioFilter {
    /// The filter's ffmpeg expression.
    pub fn to_expression(&self) -> String {
        match self {
            AudioFilter::SilenceTrim {
                threshold_db,
                min_silence_secs,
            } => format!(
                "silenceremove=start_periods=1:start_threshold={t}dB:stop_periods=-1:stop_threshold={t}dB:stop_duration={d}",
                t = threshold_db,
                d = min_silence_secs
            ),
            AudioFilter::NoiseReduction { noise_floor_db } => {
                format!("afftdn=nf={}", noise_floor_db)
            }
            AudioFilter::Compressor {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
            } => format!(
                "acompressor=threshold={}dB:ratio={}:attack={}:release={}",
                threshold_db, ratio, attack_ms, release_ms
            ),
            AudioFilter::Gain { volume } => format!("volume={}", volume),
            AudioFilter::Resample { rate_hz } => format!("aresample={}", rate_hz),
        }
    }

    pub fn is_silence_trim(&self) -> bool {
        matches!(self, AudioFilter::SilenceTrim { .. })
    }
}

/// An ordered filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    variant: ChainVariant,
    filters: Vec<AudioFilter>,
}

impl FilterChain {
    /// Chain for a separated stem: two trim passes, then denoise, compress,
    /// gain and the optional resample.
    pub fn enhanced(settings: &FilterSettings) -> Self {
        let mut filters = vec![
            AudioFilter::SilenceTrim {
                threshold_db: settings.trim_threshold_db,
                min_silence_secs: settings.min_silence_secs,
            },
            AudioFilter::SilenceTrim {
                threshold_db: settings.strict_trim_threshold_db,
                min_silence_secs: settings.min_silence_secs,
            },
            AudioFilter::NoiseReduction {
                noise_floor_db: settings.noise_floor_db,
            },
            compressor(settings),
            AudioFilter::Gain {
                volume: settings.gain,
            },
        ];
        if let Some(rate_hz) = settings.resample_hz {
            filters.push(AudioFilter::Resample { rate_hz });
        }
        Self {
            variant: ChainVariant::Enhanced,
            filters,
        }
    }

    /// Chain for the unseparated mix: gain, denoise and compression only.
    pub fn basic(settings: &FilterSettings) -> Self {
        Self {
            variant: ChainVariant::Basic,
            filters: vec![
                AudioFilter::Gain {
                    volume: settings.gain,
                },
                AudioFilter::NoiseReduction {
                    noise_floor_db: settings.noise_floor_db,
                },
                compressor(settings),
            ],
        }
    }

    pub fn for_variant(variant: ChainVariant, settings: &FilterSettings) -> Self {
        match variant {
            ChainVariant::Enhanced => Self::enhanced(settings),
            ChainVariant::Basic => Self::basic(settings),
        }
    }

    pub fn variant(&self) -> ChainVariant {
        self.variant
    }

    pub fn filters(&self) -> &[AudioFilter] {
        &self.filters
    }

    /// The `-af` argument: filters joined in order.
    pub fn to_expression(&self) -> String {
        self.filters
            .iter()
            .map(AudioFilter::to_expression)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn compressor(settings: &FilterSettings) -> AudioFilter {
    AudioFilter::Compressor {
        threshold_db: settings.compressor_threshold_db,
        ratio: settings.compressor_ratio,
        attack_ms: settings.compressor_attack_ms,
        release_ms: settings.compressor_release_ms,
    }
}
