//! Job description types shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

/// A requested extraction window, in seconds from the start of the source.
///
/// Only honored when both bounds are finite, non-negative and `end > start`.
/// Any other window is treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TrimWindow {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// Builds a window from optional bounds. Both must be present.
    pub fn from_bounds(start_secs: Option<f64>, end_secs: Option<f64>) -> Option<Self> {
        match (start_secs, end_secs) {
            (Some(start), Some(end)) => Some(Self::new(start, end)),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_secs.is_finite()
            && self.end_secs.is_finite()
            && self.start_secs >= 0.0
            && self.end_secs > self.start_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// The window actually handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractWindow {
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl ExtractWindow {
    /// Resolves the effective window for a job.
    ///
    /// A valid trim window is used as-is. A missing or invalid one falls back
    /// to `[0, max_duration_secs)`.
    pub fn resolve(trim: Option<&TrimWindow>, max_duration_secs: u64) -> Self {
        match trim {
            Some(window) if window.is_valid() => Self {
                start_secs: window.start_secs,
                duration_secs: window.duration_secs(),
            },
            Some(window) => {
                warn!(
                    "Ignoring invalid trim window {}..{}; applying {}s duration cap",
                    window.start_secs, window.end_secs, max_duration_secs
                );
                Self::capped(max_duration_secs)
            }
            None => Self::capped(max_duration_secs),
        }
    }

    fn capped(max_duration_secs: u64) -> Self {
        Self {
            start_secs: 0.0,
            duration_secs: max_duration_secs as f64,
        }
    }
}

/// One unit of work: fetch `source_ref`, process it and store the result
/// under `container_group` as `desired_output_identity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub source_ref: String,
    pub desired_output_identity: String,
    pub working_identity: String,
    pub container_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_window: Option<TrimWindow>,
}

impl JobSpec {
    pub fn new(
        source_ref: impl Into<String>,
        desired_output_identity: impl Into<String>,
        working_identity: impl Into<String>,
        container_group: impl Into<String>,
    ) -> Self {
        Self {
            source_ref: source_ref.into(),
            desired_output_identity: desired_output_identity.into(),
            working_identity: working_identity.into(),
            container_group: container_group.into(),
            trim_window: None,
        }
    }

    pub fn with_trim_window(mut self, window: TrimWindow) -> Self {
        self.trim_window = Some(window);
        self
    }
}

/// Derives the stable job id for a normalized identity.
///
/// The same group and name always produce the same id, across runs.
pub fn derive_job_id(container_group: &str, normalized_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(container_group.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized_name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_window_requires_both_bounds() {
        assert!(TrimWindow::from_bounds(Some(1.0), None).is_none());
        assert!(TrimWindow::from_bounds(None, Some(5.0)).is_none());
        assert_eq!(
            TrimWindow::from_bounds(Some(1.0), Some(5.0)),
            Some(TrimWindow::new(1.0, 5.0))
        );
    }

    #[test]
    fn test_valid_window_used_exactly() {
        let window = TrimWindow::new(12.5, 42.5);
        let extract = ExtractWindow::resolve(Some(&window), 90);
        assert_eq!(extract.start_secs, 12.5);
        assert_eq!(extract.duration_secs, 30.0);
    }

    #[test]
    fn test_valid_window_longer_than_cap_is_not_capped() {
        let window = TrimWindow::new(0.0, 600.0);
        let extract = ExtractWindow::resolve(Some(&window), 90);
        assert_eq!(extract.duration_secs, 600.0);
    }

    #[test]
    fn test_reversed_window_treated_as_absent() {
        let reversed = TrimWindow::new(30.0, 10.0);
        assert!(!reversed.is_valid());
        assert_eq!(
            ExtractWindow::resolve(Some(&reversed), 90),
            ExtractWindow::resolve(None, 90)
        );
    }

    #[test]
    fn test_degenerate_windows_treated_as_absent() {
        for window in [
            TrimWindow::new(10.0, 10.0),
            TrimWindow::new(-5.0, 10.0),
            TrimWindow::new(0.0, f64::NAN),
            TrimWindow::new(0.0, f64::INFINITY),
        ] {
            let extract = ExtractWindow::resolve(Some(&window), 45);
            assert_eq!(extract.start_secs, 0.0);
            assert_eq!(extract.duration_secs, 45.0);
        }
    }

    #[test]
    fn test_job_id_is_deterministic() {
        let a = derive_job_id("group", "song");
        let b = derive_job_id("group", "song");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, derive_job_id("other", "song"));
        // The separator keeps ("ab", "c") distinct from ("a", "bc").
        assert_ne!(derive_job_id("ab", "c"), derive_job_id("a", "bc"));
    }

    #[test]
    fn test_job_spec_deserializes_without_window() {
        let json = r#"{
            "source_ref": "https://example.com/watch?v=abc",
            "desired_output_identity": "Song",
            "working_identity": "Song.download",
            "container_group": "mix"
        }"#;
        let job: JobSpec = serde_json::from_str(json).unwrap();
        assert!(job.trim_window.is_none());
        assert_eq!(job.container_group, "mix");
    }
}
