//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram, Unit};
use std::time::Duration;

/// Metrics prefix for all Quarry metrics
pub const METRICS_PREFIX: &str = "quarry";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for extraction pipeline latency (OCR and video runs are slow)
pub const EXTRACTION_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Upload metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Uploads accepted, by file kind"
    );

    describe_counter!(
        format!("{}_uploads_rejected_total", METRICS_PREFIX),
        Unit::Count,
        "Uploads rejected at validation, by reason"
    );

    // Extraction metrics
    describe_counter!(
        format!("{}_extractions_total", METRICS_PREFIX),
        Unit::Count,
        "Extraction jobs finished, by file kind and outcome"
    );

    describe_histogram!(
        format!("{}_extraction_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Extraction pipeline latency in seconds"
    );

    describe_gauge!(
        format!("{}_extraction_queue_depth", METRICS_PREFIX),
        Unit::Count,
        "Jobs currently waiting in the extraction queue"
    );

    describe_counter!(
        format!("{}_entities_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Knowledge entities written, by label"
    );

    describe_counter!(
        format!("{}_frames_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Video frames extracted and stored"
    );
}

/// Record an accepted upload
pub fn record_upload(kind: &str) {
    counter!(format!("{}_uploads_total", METRICS_PREFIX), "kind" => kind.to_string())
        .increment(1);
}

/// Record a rejected upload
pub fn record_upload_rejected(reason: &str) {
    counter!(
        format!("{}_uploads_rejected_total", METRICS_PREFIX),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a finished extraction job
pub fn record_extraction(kind: &str, outcome: &str, elapsed: Duration) {
    counter!(
        format!("{}_extractions_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_extraction_duration_seconds", METRICS_PREFIX))
        .record(elapsed.as_secs_f64());
}
