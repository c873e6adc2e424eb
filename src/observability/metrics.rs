//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `atlas_connection_reconcile_requests_total` - Reconcile requests enqueued by watched-object events
//! - `atlas_connection_updates_filtered_total` - Updates dropped as insignificant
//! - `atlas_connection_secrets_upserted_total` - Connection secret writes by outcome
//! - `atlas_connection_secrets_deleted_total` - Connection secrets removed by cleanup
//! - `atlas_connection_sync_total` - Synchronizer passes by result phase
//! - `atlas_connection_sync_duration_seconds` - Duration of a synchronizer pass
//! - `atlas_connection_atlas_request_duration_seconds` - Duration of Atlas API calls
//! - `atlas_connection_atlas_request_errors_total` - Failed Atlas API calls
//! - `atlas_connection_audit_targets_total` - Auditing target evaluations by state

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILE_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atlas_connection_reconcile_requests_total",
            "Reconcile requests enqueued for dependents of a watched object",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILE_REQUESTS_TOTAL metric - this should never happen")
});

static UPDATES_FILTERED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atlas_connection_updates_filtered_total",
            "Update events dropped because the payload did not change",
        ),
        &["kind"],
    )
    .expect("Failed to create UPDATES_FILTERED_TOTAL metric - this should never happen")
});

static SECRETS_UPSERTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atlas_connection_secrets_upserted_total",
            "Connection secret writes by outcome (created, updated, unchanged)",
        ),
        &["outcome"],
    )
    .expect("Failed to create SECRETS_UPSERTED_TOTAL metric - this should never happen")
});

static SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "atlas_connection_secrets_deleted_total",
        "Connection secrets removed by cleanup",
    )
    .expect("Failed to create SECRETS_DELETED_TOTAL metric - this should never happen")
});

static SYNC_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atlas_connection_sync_total",
            "Synchronizer passes by result phase",
        ),
        &["phase"],
    )
    .expect("Failed to create SYNC_TOTAL metric - this should never happen")
});

static SYNC_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "atlas_connection_sync_duration_seconds",
            "Duration of a synchronizer pass in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create SYNC_DURATION metric - this should never happen")
});

static ATLAS_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "atlas_connection_atlas_request_duration_seconds",
            "Duration of Atlas Admin API requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create ATLAS_REQUEST_DURATION metric - this should never happen")
});

static ATLAS_REQUEST_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atlas_connection_atlas_request_errors_total",
            "Atlas Admin API requests answered with a non-2xx status",
        ),
        &["operation"],
    )
    .expect("Failed to create ATLAS_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

static AUDIT_TARGETS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atlas_connection_audit_targets_total",
            "Auditing target evaluations by state",
        ),
        &["state"],
    )
    .expect("Failed to create AUDIT_TARGETS_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry. Call once at startup.
///
/// # Errors
/// Returns an error if a metric is already registered
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILE_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPDATES_FILTERED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_UPSERTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_DURATION.clone()))?;
    REGISTRY.register(Box::new(ATLAS_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(ATLAS_REQUEST_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AUDIT_TARGETS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconcile_requests(kind: &str, count: usize) {
    RECONCILE_REQUESTS_TOTAL
        .with_label_values(&[kind])
        .inc_by(count as u64);
}

pub fn increment_updates_filtered(kind: &str) {
    UPDATES_FILTERED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_connection_secrets_upserted(outcome: &str) {
    SECRETS_UPSERTED_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_connection_secrets_deleted(count: usize) {
    SECRETS_DELETED_TOTAL.inc_by(count as u64);
}

pub fn increment_sync_outcome(phase: &str) {
    SYNC_TOTAL.with_label_values(&[phase]).inc();
}

pub fn observe_sync_duration(duration: f64) {
    SYNC_DURATION.observe(duration);
}

pub fn observe_atlas_request(operation: &str, duration: f64) {
    ATLAS_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_atlas_request_errors(operation: &str) {
    ATLAS_REQUEST_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_audit_targets(state: &str) {
    AUDIT_TARGETS_TOTAL.with_label_values(&[state]).inc();
}
