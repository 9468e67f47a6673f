//! # Types
//!
//! Values passed between the driver and the reconcilers.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why an attempt was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Desired state changed (create, spec edit, annotation, deletion request)
    Change,
    /// Scheduled re-observation of a converged record
    Poll,
    /// Retry after a failed attempt
    ErrorBackoff,
    /// Periodic relist of every record
    PeriodicSync,
    /// A change arrived while the previous attempt was still running
    Pending,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Change => "change",
            TriggerSource::Poll => "poll",
            TriggerSource::ErrorBackoff => "error-backoff",
            TriggerSource::PeriodicSync => "periodic-sync",
            TriggerSource::Pending => "pending-change",
        }
    }
}

/// What the driver should do after a successful attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    RequeueAfter(Duration),
    /// The record is gone or no longer managed
    Done,
}

/// Per-attempt context handed out by the driver
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub trigger: TriggerSource,
    /// Cancelled on shutdown
    pub cancel: CancellationToken,
    /// Overall deadline of the attempt
    pub timeout: Duration,
    /// Consecutive failures before this attempt
    pub retries: u32,
}

impl AttemptContext {
    pub fn new(trigger: TriggerSource, timeout: Duration) -> Self {
        Self {
            trigger,
            cancel: CancellationToken::new(),
            timeout,
            retries: 0,
        }
    }
}
