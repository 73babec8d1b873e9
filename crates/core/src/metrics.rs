//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (outcomes, per-stage durations, separation fallbacks, retries)
//! - Batches (outcomes, archive entries)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs finished, by result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stemcut_jobs_total", "Total jobs finished"),
        &["result"], // "success", "skipped", "failed"
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "stemcut_stage_duration_seconds",
            "Duration of a single pipeline stage",
        )
        .buckets(vec![0.05, 0.25, 1.0, 5.0, 15.0, 30.0, 60.0, 180.0, 600.0, 1800.0]),
        &["stage", "status"],
    )
    .unwrap()
});

/// Jobs encoded with the basic chain, by why separation was not used.
pub static SEPARATION_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stemcut_separation_fallbacks_total",
            "Jobs that fell back to the basic filter chain",
        ),
        &["reason"], // "unavailable", "failed", "timeout", "io"
    )
    .unwrap()
});

/// Acquisition retries after transient failures.
pub static ACQUIRE_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "stemcut_acquire_retries_total",
        "Acquisition attempts retried after a transient failure",
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches finished, by result.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stemcut_batches_total", "Total batches finished"),
        &["result"], // "archived", "empty"
    )
    .unwrap()
});

/// Entries written per archive.
pub static ARCHIVE_ENTRIES: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("stemcut_archive_entries", "Number of entries per batch archive")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &[],
    )
    .unwrap()
});

/// All core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_TOTAL.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(SEPARATION_FALLBACKS.clone()),
        Box::new(ACQUIRE_RETRIES.clone()),
        // Batches
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(ARCHIVE_ENTRIES.clone()),
    ]
}
