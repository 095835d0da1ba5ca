//! Retry policy configuration

use crate::ConfigError;
use std::time::Duration;

/// Policy governing one retry-engine run against a single vendor.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total tries against one adapter (1 initial + retries).
    pub max_attempts: u32,
    /// Hard upper bound on a single vendor call.
    pub per_attempt_timeout: Duration,
    /// Starting wait between attempts.
    pub base_backoff: Duration,
    /// Cap on the exponential backoff.
    pub max_backoff: Duration,
    /// Multiplicative jitter window (0.1 means +/-10%).
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(2),
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            jitter_fraction: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy from environment variables, falling back to the
    /// defaults above.
    ///
    /// # Environment Variables
    /// - `SWITCHBOARD_RETRY_MAX_ATTEMPTS`
    /// - `SWITCHBOARD_RETRY_PER_ATTEMPT_TIMEOUT_MS`
    /// - `SWITCHBOARD_RETRY_BASE_BACKOFF_MS`
    /// - `SWITCHBOARD_RETRY_MAX_BACKOFF_MS`
    /// - `SWITCHBOARD_RETRY_JITTER_FRACTION`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_attempts: env_parse("SWITCHBOARD_RETRY_MAX_ATTEMPTS")
                .unwrap_or(defaults.max_attempts),
            per_attempt_timeout: env_parse("SWITCHBOARD_RETRY_PER_ATTEMPT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.per_attempt_timeout),
            base_backoff: env_parse("SWITCHBOARD_RETRY_BASE_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_backoff),
            max_backoff: env_parse("SWITCHBOARD_RETRY_MAX_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            jitter_fraction: env_parse("SWITCHBOARD_RETRY_JITTER_FRACTION")
                .unwrap_or(defaults.jitter_fraction),
        }
    }

    /// Validate the policy before use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(ConfigError::InvalidValue {
                field: "jitter_fraction".to_string(),
                value: self.jitter_fraction.to_string(),
                reason: "must be in [0, 1)".to_string(),
            });
        }
        Ok(())
    }

    /// Convenience builder used heavily in tests.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
