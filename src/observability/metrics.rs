//! # Metrics
//!
//! Prometheus metrics for monitoring the provider.
//!
//! ## Metrics Exposed
//!
//! - `harbor_provider_reconciliations_total` - Reconciliation attempts by kind and result
//! - `harbor_provider_reconciliation_errors_total` - Failed attempts by kind and reason
//! - `harbor_provider_reconciliation_duration_seconds` - Attempt duration by kind
//! - `harbor_provider_requeues_total` - Requeues by trigger
//! - `harbor_provider_external_operations_total` - Harbor API calls by kind and operation
//! - `harbor_provider_external_operation_errors_total` - Failed Harbor API calls
//! - `harbor_provider_external_operation_duration_seconds` - Harbor API call duration
//! - `harbor_provider_reconciliations_in_flight` - Attempts currently running
//! - `harbor_provider_rate_limited_total` - Attempt starts delayed by the global rate limit
//! - `harbor_provider_watch_restarts_total` - Watch stream restarts by kind
//! - `harbor_provider_connection_secrets_published_total` - Connection secrets written
//! - `harbor_provider_generated_passwords_total` - Passwords generated for composite users

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harbor_provider_reconciliations_total",
            "Total number of reconciliation attempts by kind and result",
        ),
        &["kind", "result"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harbor_provider_reconciliation_errors_total",
            "Total number of reconciliation errors by kind and reason",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "harbor_provider_reconciliation_duration_seconds",
            "Duration of reconciliation attempts in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harbor_provider_requeues_total",
            "Total number of requeues by trigger",
        ),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static EXTERNAL_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harbor_provider_external_operations_total",
            "Total number of Harbor API operations by kind and operation",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create EXTERNAL_OPERATIONS_TOTAL metric - this should never happen")
});

static EXTERNAL_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harbor_provider_external_operation_errors_total",
            "Total number of failed Harbor API operations by kind and operation",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create EXTERNAL_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static EXTERNAL_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "harbor_provider_external_operation_duration_seconds",
            "Duration of Harbor API operations in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["kind"],
    )
    .expect("Failed to create EXTERNAL_OPERATION_DURATION metric - this should never happen")
});

static RECONCILIATIONS_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "harbor_provider_reconciliations_in_flight",
        "Number of reconciliation attempts currently running",
    )
    .expect("Failed to create RECONCILIATIONS_IN_FLIGHT metric - this should never happen")
});

static RATE_LIMITED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "harbor_provider_rate_limited_total",
        "Total number of attempt starts delayed by the global rate limit",
    )
    .expect("Failed to create RATE_LIMITED_TOTAL metric - this should never happen")
});

static WATCH_RESTARTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "harbor_provider_watch_restarts_total",
            "Total number of watch stream restarts by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create WATCH_RESTARTS_TOTAL metric - this should never happen")
});

static CONNECTION_SECRETS_PUBLISHED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "harbor_provider_connection_secrets_published_total",
        "Total number of connection secrets written",
    )
    .expect("Failed to create CONNECTION_SECRETS_PUBLISHED_TOTAL metric - this should never happen")
});

static GENERATED_PASSWORDS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "harbor_provider_generated_passwords_total",
        "Total number of passwords generated for composite users",
    )
    .expect("Failed to create GENERATED_PASSWORDS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXTERNAL_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXTERNAL_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXTERNAL_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATIONS_IN_FLIGHT.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMITED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_RESTARTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONNECTION_SECRETS_PUBLISHED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GENERATED_PASSWORDS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str, result: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind, result]).inc();
}

pub fn increment_reconciliation_errors(kind: &str, reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[kind, reason])
        .inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_requeues_total(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}

/// Record a completed Harbor API call
pub fn record_external_operation(kind: &str, operation: &str, duration: f64) {
    EXTERNAL_OPERATIONS_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
    EXTERNAL_OPERATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_external_operation_errors(kind: &str, operation: &str) {
    EXTERNAL_OPERATION_ERRORS_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

pub fn set_reconciliations_in_flight(count: i64) {
    RECONCILIATIONS_IN_FLIGHT.set(count);
}

pub fn increment_rate_limited() {
    RATE_LIMITED_TOTAL.inc();
}

pub fn increment_watch_restarts(kind: &str) {
    WATCH_RESTARTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_connection_secrets_published() {
    CONNECTION_SECRETS_PUBLISHED_TOTAL.inc();
}

pub fn increment_generated_passwords() {
    GENERATED_PASSWORDS_TOTAL.inc();
}
