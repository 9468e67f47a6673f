//! # Error Policy
//!
//! Requeue decisions for failed attempts and classification of watch
//! stream errors.
//!
//! Failed attempts back off exponentially per record, so one failing record
//! never delays the others. Errors that need operator action are requeued at
//! the poll interval instead of being retried with backoff.

use crate::controller::backoff::BackoffState;
use crate::controller::error::ReconcileError;
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-record retry bookkeeping, owned by the driver
#[derive(Debug)]
pub struct ErrorPolicy {
    states: HashMap<String, BackoffState>,
    backoff_start: Duration,
    backoff_max: Duration,
    poll_interval: Duration,
}

impl ErrorPolicy {
    pub fn new(backoff_start: Duration, backoff_max: Duration, poll_interval: Duration) -> Self {
        Self {
            states: HashMap::new(),
            backoff_start,
            backoff_max,
            poll_interval,
        }
    }

    /// Consecutive failures recorded for `identity`
    pub fn retries(&self, identity: &str) -> u32 {
        self.states.get(identity).map_or(0, |s| s.error_count)
    }

    /// Forget the failures of `identity` after a successful attempt
    pub fn reset(&mut self, identity: &str) {
        self.states.remove(identity);
    }

    /// Delay before the next attempt of a record whose attempt failed
    pub fn handle_reconciliation_error(
        &mut self,
        kind: &str,
        identity: &str,
        error: &ReconcileError,
    ) -> Duration {
        let error_span = tracing::span!(
            tracing::Level::ERROR,
            "controller.reconcile.error",
            resource.kind = kind,
            resource.identity = identity,
            error = %error
        );
        let _error_guard = error_span.enter();

        metrics::increment_reconciliation_errors(kind, error.reason());
        let (start, max) = (self.backoff_start, self.backoff_max);
        let state = self
            .states
            .entry(identity.to_string())
            .or_insert_with(|| BackoffState::new(start, max));
        state.increment_error();

        if error.is_permanent() {
            warn!(
                reason = error.reason(),
                "Reconciliation of {} needs operator action: {}", identity, error
            );
            metrics::increment_requeues_total("poll");
            return self.poll_interval;
        }

        error!("Reconciliation error for {}: {}", identity, error);
        let delay = state.backoff.next_backoff();
        let error_count = state.error_count;

        let next_trigger_time = chrono::Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        info!(
            "🔄 Retrying with exponential backoff: {:?} (error count: {}, trigger source: error-backoff)",
            delay, error_count
        );
        info!(
            "📅 Next retry scheduled: {} (in {:?}, trigger source: error-backoff)",
            next_trigger_time.to_rfc3339(),
            delay
        );

        metrics::increment_requeues_total("error-backoff");
        delay
    }
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// Returns `None` when the stream should be restarted, `Some(())` when the
/// error is benign and the stream may continue.
pub async fn handle_watch_stream_error(
    kind: &str,
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        resource.kind = kind,
        error = %error_string
    );
    let _error_guard = error_span.enter();

    // 404 first: a plain-text 404 body surfaces as a decode error mentioning the watch
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 {
        error!(
            "❌ Watch on {} failed with 401 Unauthorized - RBAC may have been revoked or the token expired",
            kind
        );
        error!("🔍 Check that the provider's ServiceAccount is still bound to a role that can list and watch {}", kind);
        warn!(
            "⏳ Waiting {}s before retrying watch (RBAC may need time to propagate)...",
            watch_restart_delay_secs
        );
        tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        None
    } else if is_410 {
        warn!(
            "Watch resource version for {} expired (410), watch will restart",
            kind
        );
        None
    } else if is_429 {
        let current_backoff = backoff.load(Ordering::Relaxed);
        warn!(
            "API server storage reinitializing (429), backing off for {}ms before restart...",
            current_backoff
        );
        tokio::time::sleep(Duration::from_millis(current_backoff)).await;
        let new_backoff = current_backoff.saturating_mul(2).min(max_backoff_ms);
        backoff.store(new_backoff, Ordering::Relaxed);
        None
    } else if is_not_found {
        warn!(
            "{} not found (404) - the CRD may be missing or the record was deleted. Error: {}",
            kind, error_string
        );
        Some(())
    } else {
        error!("Watch stream error for {}: {}", kind, error_string);
        tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        None
    }
}
