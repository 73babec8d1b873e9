//! Batch API handler.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stemcut_core::{BatchError, JobDiagnostic};
use tracing::{error, info};

use super::jobs::JobRequest;
use crate::state::AppState;

/// Request body for a batch
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// Jobs in submission order
    pub jobs: Vec<JobRequest>,
}

/// Response for a batch, successful or not
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// "archived" or "failed"
    pub status: String,
    /// Archive path relative to the storage root
    pub archive_reference: Option<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub per_job_diagnostics: Vec<JobDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResponse {
    fn failed(diagnostics: Vec<JobDiagnostic>, error: impl Into<String>) -> Self {
        let failed = diagnostics.iter().filter(|d| d.status == "failed").count();
        Self {
            status: "failed".to_string(),
            archive_reference: None,
            succeeded: 0,
            failed,
            per_job_diagnostics: diagnostics,
            error: Some(error.into()),
        }
    }
}

/// Run a batch and return the archive reference with per-job diagnostics.
///
/// 200 with an archive, 422 when no job produced an artifact, 400 when the
/// request is empty or too large, 500 when the archive could not be written.
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchRequest>,
) -> (StatusCode, Json<BatchResponse>) {
    let jobs: Vec<_> = body.jobs.into_iter().map(JobRequest::into_spec).collect();
    info!("Batch submitted with {} jobs", jobs.len());

    match state.scheduler().run(jobs).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(BatchResponse {
                status: "archived".to_string(),
                archive_reference: Some(outcome.archive_reference.display().to_string()),
                succeeded: outcome.succeeded,
                failed: outcome.failed,
                per_job_diagnostics: outcome.diagnostics(),
                error: None,
            }),
        ),
        Err(e) if e.is_rejection() => (
            StatusCode::BAD_REQUEST,
            Json(BatchResponse::failed(Vec::new(), e.to_string())),
        ),
        Err(BatchError::Empty { diagnostics }) => {
            let message = format!("No job produced an artifact ({} jobs)", diagnostics.len());
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(BatchResponse::failed(diagnostics, message)),
            )
        }
        Err(e) => {
            error!("Batch failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BatchResponse::failed(Vec::new(), e.to_string())),
            )
        }
    }
}
