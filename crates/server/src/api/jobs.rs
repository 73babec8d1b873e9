//! Single-job API handler.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use stemcut_core::{JobSpec, PipelineResult, TrimWindow};
use tracing::info;

use crate::state::AppState;

/// Container group used when a request names none.
pub const DEFAULT_GROUP: &str = "default";

/// One job as submitted over HTTP
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    /// Remote media locator passed to the acquisition tool
    pub source_ref: String,
    /// Name of the final artifact, before legalization
    pub desired_output_identity: String,
    /// Name of the downloaded intermediate; derived when absent
    #[serde(default)]
    pub working_identity: Option<String>,
    #[serde(default)]
    pub container_group: Option<String>,
    /// Trim window start in seconds
    #[serde(default)]
    pub trim_start: Option<f64>,
    /// Trim window end in seconds
    #[serde(default)]
    pub trim_end: Option<f64>,
}

impl JobRequest {
    pub fn into_spec(self) -> JobSpec {
        let working_identity = self
            .working_identity
            .unwrap_or_else(|| format!("{} (source)", self.desired_output_identity));
        let group = self
            .container_group
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());

        let spec = JobSpec::new(
            self.source_ref,
            self.desired_output_identity,
            working_identity,
            group,
        );
        match TrimWindow::from_bounds(self.trim_start, self.trim_end) {
            Some(window) => spec.with_trim_window(window),
            None => spec,
        }
    }
}

/// Run one job and return its result.
///
/// 200 when the artifact exists afterwards or the job was skipped, 422 when
/// the job failed.
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<JobRequest>,
) -> (StatusCode, Json<PipelineResult>) {
    let spec = body.into_spec();
    info!(
        "Job submitted: {} -> {}/{}",
        spec.source_ref, spec.container_group, spec.desired_output_identity
    );

    let result = state.scheduler().run_job(spec).await;
    let status = if result.is_failed() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    (status, Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> JobRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults_are_derived() {
        let spec = request(serde_json::json!({
            "source_ref": "https://media.example.com/a",
            "desired_output_identity": "Song"
        }))
        .into_spec();
        assert_eq!(spec.working_identity, "Song (source)");
        assert_eq!(spec.container_group, DEFAULT_GROUP);
        assert!(spec.trim_window.is_none());
    }

    #[test]
    fn test_trim_window_needs_both_bounds() {
        let spec = request(serde_json::json!({
            "source_ref": "s",
            "desired_output_identity": "Song",
            "trim_start": 3.0
        }))
        .into_spec();
        assert!(spec.trim_window.is_none());

        let spec = request(serde_json::json!({
            "source_ref": "s",
            "desired_output_identity": "Song",
            "container_group": "covers",
            "trim_start": 3.0,
            "trim_end": 9.5
        }))
        .into_spec();
        let window = spec.trim_window.unwrap();
        assert_eq!(window.start_secs, 3.0);
        assert_eq!(window.end_secs, 9.5);
        assert_eq!(spec.container_group, "covers");
    }
}
