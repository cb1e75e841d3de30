//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Task lifecycle (submissions, outcomes, phase durations)
//! - Fan-out rendering (panels per comic)
//! - External services (analyzer, image generator, artifact store)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Task Lifecycle Metrics
// =============================================================================

/// Submissions total by validation outcome.
pub static SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("toonmill_submissions_total", "Total comic submissions"),
        &["result"], // "accepted", "rejected", "validation_error"
    )
    .unwrap()
});

/// Tasks that reached completed or failed.
pub static TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("toonmill_tasks_finished_total", "Total tasks finished"),
        &["status"], // "completed", "failed"
    )
    .unwrap()
});

/// Tasks currently running their continuation.
pub static TASKS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "toonmill_tasks_in_flight",
        "Tasks with a running render continuation",
    )
    .unwrap()
});

/// Phase duration in seconds.
pub static PHASE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("toonmill_phase_duration_seconds", "Duration of task phases")
            .buckets(vec![1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0]),
        &["phase"], // "scenario", "character_sheet", "episodes", "total"
    )
    .unwrap()
});

/// Panels per completed comic.
pub static PANELS_PER_COMIC: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("toonmill_panels_per_comic", "Number of panels per comic")
            .buckets(vec![1.0, 2.0, 4.0, 6.0, 8.0, 12.0, 16.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Retries by operation ("service.method").
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("toonmill_retry_attempts_total", "Total retry attempts"),
        &["operation"],
    )
    .unwrap()
});

/// External call attempts by service, method and status.
pub static EXTERNAL_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "toonmill_external_calls_total",
            "Total external service call attempts",
        ),
        &["service", "method", "status"],
    )
    .unwrap()
});

/// External call attempt duration in seconds.
pub static EXTERNAL_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "toonmill_external_call_duration_seconds",
            "Duration of external service call attempts",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["service", "method"],
    )
    .unwrap()
});

/// Failures by classified kind.
pub static FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("toonmill_failures_total", "Task failures by kind"),
        &["kind"],
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Tasks
        Box::new(SUBMISSIONS.clone()),
        Box::new(TASKS_FINISHED.clone()),
        Box::new(TASKS_IN_FLIGHT.clone()),
        Box::new(PHASE_DURATION.clone()),
        Box::new(PANELS_PER_COMIC.clone()),
        // External services
        Box::new(RETRY_ATTEMPTS.clone()),
        Box::new(EXTERNAL_CALLS.clone()),
        Box::new(EXTERNAL_CALL_DURATION.clone()),
        Box::new(FAILURES.clone()),
    ]
}
