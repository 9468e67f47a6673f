//! # Exponential Backoff
//!
//! Retry delays for failed reconciliation attempts. Each failure doubles the
//! delay, starting at the configured minimum and capped at the maximum; a
//! successful attempt resets the sequence.
//!
//! ## Usage
//!
//! ```rust
//! use harbor_provider::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(5));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(4));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
//! ```

use std::time::Duration;

/// Exponential backoff calculator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    current: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `min` and never exceeding `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min = min.min(max);
        Self {
            min,
            current: min,
            max,
        }
    }

    /// Get the next delay and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        result
    }

    /// Reset to the initial delay
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Per-record retry state kept by the driver
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: ExponentialBackoff::new(min, max),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}
