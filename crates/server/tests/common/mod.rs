//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock stages injected, so the API can be exercised without yt-dlp,
//! demucs or ffmpeg installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use stemcut_core::{
    stages::RetryConfig,
    testing::{MockAcquirer, MockEncoder, MockSeparator},
    ArchiveAggregator, AudioFormat, BatchConfig, BatchScheduler, Config, IdentityResolver,
    PipelineCoordinator,
};
use stemcut_server::{api::create_router, state::AppState};

/// Test fixture with mock stages.
///
/// Provides an in-process router with fully controllable mocks for:
/// - Acquisition (MockAcquirer)
/// - Separation (MockSeparator)
/// - Encoding (MockEncoder)
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub acquirer: MockAcquirer,
    pub separator: MockSeparator,
    pub encoder: MockEncoder,
    /// Storage root the pipeline writes to
    pub storage_root: PathBuf,
    /// Keeps the storage root alive
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub max_concurrent_jobs: usize,
    pub max_jobs_per_batch: usize,
    pub separation_available: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            max_jobs_per_batch: 10,
            separation_available: true,
        }
    }
}

impl TestConfig {
    /// Create config where the separation health check fails.
    pub fn without_separation() -> Self {
        Self {
            separation_available: false,
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage_root = temp_dir.path().join("storage");

        let mut config = Config::default();
        config.storage.root = storage_root.clone();
        config.batch = BatchConfig::default()
            .with_max_concurrent(test_config.max_concurrent_jobs)
            .with_max_jobs(test_config.max_jobs_per_batch);

        let acquirer = MockAcquirer::new();
        let separator = if test_config.separation_available {
            MockSeparator::new()
        } else {
            MockSeparator::unavailable()
        };
        let encoder = MockEncoder::new();

        let resolver = IdentityResolver::new(
            &storage_root,
            config.storage.scratch_root(),
            AudioFormat::Mp3.extension(),
            "wav",
            config.pipeline.max_duration_secs,
        );
        let coordinator = PipelineCoordinator::new(
            resolver,
            Arc::new(acquirer.clone()),
            Arc::new(separator.clone()),
            Arc::new(encoder.clone()),
            config.pipeline.clone(),
            AudioFormat::Mp3,
        )
        .with_retry(RetryConfig::default().with_delays(Duration::ZERO, Duration::ZERO));
        let scheduler = BatchScheduler::new(
            Arc::new(coordinator),
            ArchiveAggregator::new(&storage_root, config.storage.archive_dir.clone()),
            config.batch.clone(),
        );

        let state = Arc::new(AppState::new(config, Arc::new(scheduler)));
        let router = create_router(state);

        Self {
            router,
            acquirer,
            separator,
            encoder,
            storage_root,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        TestResponse {
            status,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }

    /// Send a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let (status, bytes) = self.send(request).await;
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        let (status, body_bytes) = self.send(request).await;

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, body_bytes.to_vec())
    }
}

/// Build a job request body.
pub fn job_body(name: &str, group: &str) -> Value {
    serde_json::json!({
        "source_ref": format!("https://media.example.com/watch?v={}", name.replace(' ', "-")),
        "desired_output_identity": name,
        "container_group": group,
    })
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
