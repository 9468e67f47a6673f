//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Command-line flags parsed in `main` take precedence over both.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval for converged records (seconds)
    pub poll_interval_secs: u64,
    /// Interval between full relists of every registered kind (seconds)
    pub sync_interval_secs: u64,
    /// Maximum concurrent reconciliations across all records
    pub max_concurrent_reconciliations: usize,
    /// Global attempt-start rate (token bucket refill per second)
    pub max_reconcile_rate: u32,
    /// Overall deadline of one reconciliation attempt (seconds)
    pub attempt_timeout_secs: u64,
    /// Exponential backoff starting value (milliseconds)
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Requeue after a successful Create or Update (milliseconds)
    pub post_write_requeue_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Harbor HTTP request timeout (seconds)
    pub http_timeout_secs: u64,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            max_reconcile_rate: DEFAULT_MAX_RECONCILE_RATE,
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            post_write_requeue_ms: DEFAULT_POST_WRITE_REQUEUE_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            poll_interval_secs: env_var_or_default(
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            ),
            sync_interval_secs: env_var_or_default(
                "SYNC_INTERVAL_SECS",
                DEFAULT_SYNC_INTERVAL_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            max_reconcile_rate: env_var_or_default(
                "MAX_RECONCILE_RATE",
                DEFAULT_MAX_RECONCILE_RATE,
            ),
            attempt_timeout_secs: env_var_or_default(
                "ATTEMPT_TIMEOUT_SECS",
                DEFAULT_ATTEMPT_TIMEOUT_SECS,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            post_write_requeue_ms: env_var_or_default(
                "POST_WRITE_REQUEUE_MS",
                DEFAULT_POST_WRITE_REQUEUE_MS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            http_timeout_secs: env_var_or_default(
                "HARBOR_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
        }
    }

    /// Apply the `DEBUG` toggle on top of the loaded level
    #[must_use]
    pub fn with_debug_from_env(mut self) -> Self {
        if env_var_or_default_bool("DEBUG", false) {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Get backoff start duration
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn post_write_requeue(&self) -> Duration {
        Duration::from_millis(self.post_write_requeue_ms)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(600));
        assert_eq!(config.sync_interval(), Duration::from_secs(3600));
        assert_eq!(config.max_reconcile_rate, 10);
        assert_eq!(config.backoff_start_duration(), Duration::from_secs(1));
        assert_eq!(config.backoff_max_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        std::env::set_var("HARBOR_PROVIDER_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_var_or_default("HARBOR_PROVIDER_TEST_GARBAGE", 42_u64), 42);
        std::env::remove_var("HARBOR_PROVIDER_TEST_GARBAGE");
    }

    #[test]
    fn test_env_var_or_default_bool_accepts_common_spellings() {
        for value in ["true", "1", "YES", "on"] {
            std::env::set_var("HARBOR_PROVIDER_TEST_BOOL", value);
            assert!(env_var_or_default_bool("HARBOR_PROVIDER_TEST_BOOL", false));
        }
        std::env::set_var("HARBOR_PROVIDER_TEST_BOOL", "nope");
        assert!(!env_var_or_default_bool("HARBOR_PROVIDER_TEST_BOOL", true));
        std::env::remove_var("HARBOR_PROVIDER_TEST_BOOL");
    }
}
