//! Testing utilities and mock implementations of the stage traits.
//!
//! The mocks create and inspect real files, so pipeline and batch tests can
//! check what is left on disk without any external tool installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use stemcut_core::testing::{MockAcquirer, MockEncoder, MockSeparator};
//!
//! let acquirer = MockAcquirer::new();
//! let separator = MockSeparator::new();
//! let encoder = MockEncoder::new();
//!
//! // Configure behavior
//! acquirer.fail_source("https://example.com/gone").await;
//! separator.set_available(false).await;
//!
//! // Use in a PipelineCoordinator...
//! ```

mod mock_acquirer;
mod mock_encoder;
mod mock_process_runner;
mod mock_separator;

pub use mock_acquirer::{MockAcquirer, RecordedAcquisition};
pub use mock_encoder::MockEncoder;
pub use mock_process_runner::MockProcessRunner;
pub use mock_separator::{MockSeparator, RecordedSeparation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::{JobSpec, TrimWindow};

    /// A job with a distinct working name in the given group.
    pub fn job(name: &str, group: &str) -> JobSpec {
        JobSpec::new(
            format!("https://media.example.com/watch?v={}", name.replace(' ', "-")),
            name,
            format!("{} (source)", name),
            group,
        )
    }

    /// A job whose source reference is `source`.
    pub fn job_with_source(source: &str, name: &str, group: &str) -> JobSpec {
        JobSpec::new(source, name, format!("{} (source)", name), group)
    }

    /// A job with a trim window.
    pub fn trimmed_job(name: &str, group: &str, start: f64, end: f64) -> JobSpec {
        job(name, group).with_trim_window(TrimWindow::new(start, end))
    }

    /// `count` distinct jobs in one group.
    pub fn jobs(count: usize, group: &str) -> Vec<JobSpec> {
        (1..=count).map(|i| job(&format!("Track {:02}", i), group)).collect()
    }
}
