//! Gateway configuration

use std::time::Duration;
use switchboard_core::RetryPolicy;

/// Configuration of the send pipeline.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Retry/backoff policy applied per vendor.
    pub retry: RetryPolicy,

    /// When enabled, replaying or colliding on an idempotency key whose
    /// stored fingerprint differs from the incoming request fails with
    /// `IDEMPOTENCY_KEY_REUSED`. Off by default.
    pub strict_fingerprint: bool,

    /// Age after which a never-completed idempotency placeholder is
    /// considered abandoned and may be taken over by a retry of the same
    /// key. Live duplicates always collide well inside this window.
    pub in_flight_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            strict_fingerprint: false,
            in_flight_ttl: Duration::from_secs(120),
        }
    }
}

impl GatewayConfig {
    /// Build configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `SWITCHBOARD_STRICT_FINGERPRINT` ("true"/"false", default false)
    /// - `SWITCHBOARD_IN_FLIGHT_TTL_MS` (default 120000)
    /// - plus the `SWITCHBOARD_RETRY_*` variables of [`RetryPolicy`]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            retry: RetryPolicy::from_env(),
            strict_fingerprint: std::env::var("SWITCHBOARD_STRICT_FINGERPRINT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.strict_fingerprint),
            in_flight_ttl: std::env::var("SWITCHBOARD_IN_FLIGHT_TTL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.in_flight_ttl),
        }
    }
}
