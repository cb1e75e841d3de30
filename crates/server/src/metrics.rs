//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the toonmill server:
//! - HTTP request metrics (latency, counts)
//! - Task counts by status (collected dynamically)
//! - Orchestrator status (collected dynamically)
//!
//! Core metrics (submissions, phases, external calls) are registered here too.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use toonmill_core::{TaskFilter, TaskStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "toonmill_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("toonmill_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "toonmill_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Task Metrics (collected dynamically)
// =============================================================================

/// Tasks by current status.
pub static TASKS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("toonmill_tasks_by_status", "Current task count by status"),
        &["status"],
    )
    .unwrap()
});

/// Whether the orchestrator accepts submissions (1) or is shutting down (0).
pub static ORCHESTRATOR_ACCEPTING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "toonmill_orchestrator_accepting",
        "Whether the orchestrator accepts submissions",
    )
    .unwrap()
});

/// Attachment uploads currently running.
pub static UPLOADS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "toonmill_uploads_active",
        "Number of attachment uploads in progress",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Tasks
    registry
        .register(Box::new(TASKS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(ORCHESTRATOR_ACCEPTING.clone()))
        .unwrap();
    registry
        .register(Box::new(UPLOADS_ACTIVE.clone()))
        .unwrap();

    // Core metrics (tasks, phases, external services)
    for metric in toonmill_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the store and orchestrator.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status();
    ORCHESTRATOR_ACCEPTING.set(if status.accepting { 1 } else { 0 });
    UPLOADS_ACTIVE.set(status.active_uploads as i64);

    for task_status in TaskStatus::ALL {
        let filter = TaskFilter::new().with_status(task_status);
        if let Ok(count) = state.orchestrator().count_tasks(&filter) {
            TASKS_BY_STATUS
                .with_label_values(&[task_status.as_str()])
                .set(count);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = HASH_SEGMENT.replace_all(&result, "{hash}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Content-addressed artifact names (sha256).
static HASH_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{64}").unwrap());

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/comics/550e8400-e29b-41d4-a716-446655440000/status";
        assert_eq!(normalize_path(path), "/api/v1/comics/{id}/status");
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/comics/12345"), "/api/v1/comics/{id}");
    }

    #[test]
    fn test_normalize_path_hash() {
        let path = "/artifacts/panels/9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08.png";
        assert_eq!(normalize_path(path), "/artifacts/panels/{hash}.png");
    }

    #[test]
    fn test_normalize_path_keeps_versions_and_words() {
        assert_eq!(normalize_path("/api/v1/comics"), "/api/v1/comics");
        assert_eq!(normalize_path("/api/v1/comics/7/result"), "/api/v1/comics/{id}/result");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("toonmill_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        toonmill_core::metrics::SUBMISSIONS
            .with_label_values(&["accepted"])
            .inc_by(0);
        TASKS_BY_STATUS.with_label_values(&["pending"]).set(0);
        ORCHESTRATOR_ACCEPTING.set(1);

        let output = encode_metrics();

        assert!(output.contains("toonmill_submissions_total"));
        assert!(output.contains("toonmill_tasks_by_status"));
        assert!(output.contains("toonmill_orchestrator_accepting"));
    }
}
