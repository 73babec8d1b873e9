//! API tests for the stemcut server.
//!
//! These run the router in-process with mock stages and check status codes
//! and response bodies for every endpoint.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{job_body, TestConfig, TestFixture};

// ============================================================================
// Health, config, pool
// ============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["batch"]["max_concurrent_jobs"], json!(1));
    assert_eq!(response.body["storage"]["output_format"], json!("mp3"));
    assert_eq!(response.body["tools"]["acquire_extra_args"], json!(0));
    assert!(response.body["tools"].get("extra_args").is_none());
}

#[tokio::test]
async fn test_pool_status() {
    let fixture = TestFixture::with_config(TestConfig {
        max_concurrent_jobs: 3,
        ..Default::default()
    });
    let response = fixture.get("/api/v1/pool").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "max_concurrent", json!(3));
    assert_json_path!(response.body, "active_jobs", json!(0));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("stemcut_http_requests_total"));
    assert!(text.contains("stemcut_pool_capacity"));
}

// ============================================================================
// Jobs
// ============================================================================

#[tokio::test]
async fn test_job_success() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/jobs", job_body("Song", "covers")).await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "chain", json!("enhanced"));
    assert!(response.body["artifact"].as_str().unwrap().ends_with("Song.mp3"));
    assert!(fixture.storage_root.join("covers").join("Song.mp3").exists());
}

#[tokio::test]
async fn test_job_repeat_is_skipped() {
    let fixture = TestFixture::new();
    fixture.post("/api/v1/jobs", job_body("Song", "covers")).await;
    let response = fixture.post("/api/v1/jobs", job_body("Song", "covers")).await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "skipped", json!("already_exists"));
    assert_eq!(fixture.acquirer.call_count().await, 1);
}

#[tokio::test]
async fn test_job_failure_is_unprocessable() {
    let fixture = TestFixture::new();
    fixture
        .acquirer
        .fail_source("https://media.example.com/watch?v=Gone")
        .await;

    let response = fixture.post("/api/v1/jobs", job_body("Gone", "covers")).await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"].is_string());
    assert!(response.body.get("artifact").is_none());
}

#[tokio::test]
async fn test_job_without_separation_uses_basic_chain() {
    let fixture = TestFixture::with_config(TestConfig::without_separation());
    let response = fixture.post("/api/v1/jobs", job_body("Song", "covers")).await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "chain", json!("basic"));
    assert_eq!(fixture.separator.separation_count().await, 0);
}

#[tokio::test]
async fn test_job_trim_window_forwarded() {
    let fixture = TestFixture::new();
    let mut body = job_body("Song", "covers");
    body["trim_start"] = json!(12.0);
    body["trim_end"] = json!(20.0);

    let response = fixture.post("/api/v1/jobs", body).await;
    assert_status!(response, StatusCode::OK);

    let jobs = fixture.encoder.jobs().await;
    assert_eq!(jobs[0].window.start_secs, 12.0);
    assert_eq!(jobs[0].window.duration_secs, 8.0);
}

#[tokio::test]
async fn test_job_malformed_json() {
    let fixture = TestFixture::new();
    let response = fixture.post_raw("/api/v1/jobs", "{not json").await;
    assert!(response.status.is_client_error());

    let response = fixture
        .post("/api/v1/jobs", json!({ "desired_output_identity": "x" }))
        .await;
    assert!(response.status.is_client_error());
    assert_eq!(fixture.acquirer.call_count().await, 0);
}

// ============================================================================
// Batches
// ============================================================================

#[tokio::test]
async fn test_batch_archives_successes() {
    let fixture = TestFixture::new();
    fixture
        .acquirer
        .fail_source("https://media.example.com/watch?v=Gone")
        .await;

    let response = fixture
        .post(
            "/api/v1/batches",
            json!({ "jobs": [job_body("One", "g"), job_body("Gone", "g"), job_body("Two", "g")] }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("archived"));
    assert_json_path!(response.body, "succeeded", json!(2));
    assert_json_path!(response.body, "failed", json!(1));

    let reference = response.body["archive_reference"].as_str().unwrap();
    assert!(reference.starts_with("archives"));
    assert!(fixture.storage_root.join(reference).exists());

    let diagnostics = response.body["per_job_diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 3);
    let failed: Vec<_> = diagnostics
        .iter()
        .filter(|d| d["status"] == json!("failed"))
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["desired_output_identity"], json!("Gone"));
}

#[tokio::test]
async fn test_batch_all_failed() {
    let fixture = TestFixture::new();
    for name in ["A", "B"] {
        fixture
            .acquirer
            .fail_source(format!("https://media.example.com/watch?v={}", name))
            .await;
    }

    let response = fixture
        .post(
            "/api/v1/batches",
            json!({ "jobs": [job_body("A", "g"), job_body("B", "g")] }),
        )
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert_json_path!(response.body, "status", json!("failed"));
    assert_json_path!(response.body, "archive_reference", json!(null));
    assert_eq!(
        response.body["per_job_diagnostics"].as_array().unwrap().len(),
        2
    );
    assert!(!fixture.storage_root.join("archives").exists());
}

#[tokio::test]
async fn test_batch_empty_rejected() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/batches", json!({ "jobs": [] })).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_json_path!(response.body, "status", json!("failed"));
}

#[tokio::test]
async fn test_batch_oversized_rejected() {
    let fixture = TestFixture::with_config(TestConfig {
        max_jobs_per_batch: 2,
        ..Default::default()
    });
    let jobs: Vec<_> = ["A", "B", "C"].iter().map(|n| job_body(n, "g")).collect();

    let response = fixture.post("/api/v1/batches", json!({ "jobs": jobs })).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("limit of 2"));
    assert_eq!(fixture.acquirer.call_count().await, 0);
}
