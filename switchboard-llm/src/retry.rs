//! Retry engine
//!
//! Executes one vendor adapter under a per-attempt timeout, sleeping between
//! retryable failures per the backoff policy. Attempts are observed in
//! invocation order with dense retry indices starting at 0.

use crate::{
    AttemptObserver, AttemptRecord, NormalizedRequest, ObserverError, VendorAdapter, VendorFailure,
};
use rand::Rng;
use std::time::Duration;
use switchboard_core::{AttemptOutcome, RetryPolicy};

/// Result of one retry-engine run against a single adapter.
#[derive(Debug, Clone)]
pub struct RetryRun {
    /// First success, or the last failure once attempts are exhausted.
    pub outcome: Result<crate::NormalizedResponse, VendorFailure>,
    /// Every attempt issued, in invocation order.
    pub attempts: Vec<AttemptRecord>,
}

/// Compute the wait before attempt `retry_index + 1`.
///
/// A vendor-supplied `retry_after_ms > 0` is used verbatim (no jitter);
/// otherwise `min(max_backoff, base_backoff * 2^i)` with multiplicative
/// jitter in `1 +/- jitter_fraction`.
pub fn backoff_delay(policy: &RetryPolicy, retry_index: u32, failure: &VendorFailure) -> Duration {
    if let Some(retry_after_ms) = failure.retry_after_ms {
        if retry_after_ms > 0 {
            return Duration::from_millis(retry_after_ms as u64);
        }
    }

    let exponential = policy.base_backoff.as_millis() as f64 * 2f64.powi(retry_index as i32);
    let capped = exponential.min(policy.max_backoff.as_millis() as f64);

    let jittered = if policy.jitter_fraction > 0.0 {
        let jitter = rand::thread_rng().gen_range(-policy.jitter_fraction..=policy.jitter_fraction);
        capped * (1.0 + jitter)
    } else {
        capped
    };

    Duration::from_millis(jittered.round().max(0.0) as u64)
}

/// Run `adapter` under `policy`, reporting each attempt to `observer` as it
/// completes and before deciding whether to retry.
///
/// Cancellation (dropping the returned future) aborts the in-flight call and
/// any pending sleep; no synthetic attempt record is produced for the
/// cancellation itself.
pub async fn run_retry(
    adapter: &dyn VendorAdapter,
    request: &NormalizedRequest,
    policy: &RetryPolicy,
    observer: &dyn AttemptObserver,
) -> Result<RetryRun, ObserverError> {
    let vendor = adapter.vendor();
    let mut attempts: Vec<AttemptRecord> = Vec::new();
    let mut retry_index: u32 = 0;

    loop {
        let started = tokio::time::Instant::now();
        let result = match tokio::time::timeout(policy.per_attempt_timeout, adapter.complete(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(VendorFailure::timeout(vendor)),
        };
        let latency_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(response) => {
                let record = AttemptRecord {
                    vendor,
                    outcome: AttemptOutcome::Success,
                    http_status: Some(200),
                    latency_ms,
                    retry_index: retry_index as i32,
                    error_code: None,
                    error_message: None,
                };
                observer.on_attempt(&record).await?;
                attempts.push(record);
                tracing::debug!(%vendor, retry_index, latency_ms, "vendor attempt succeeded");
                return Ok(RetryRun {
                    outcome: Ok(response),
                    attempts,
                });
            }
            Err(failure) => {
                let record = AttemptRecord {
                    vendor,
                    outcome: AttemptOutcome::Failed,
                    http_status: Some(failure.status_code),
                    latency_ms,
                    retry_index: retry_index as i32,
                    error_code: Some(failure.error_code.clone()),
                    error_message: Some(failure.message.clone()),
                };
                observer.on_attempt(&record).await?;
                attempts.push(record);
                tracing::debug!(
                    %vendor,
                    retry_index,
                    status = failure.status_code,
                    error_code = %failure.error_code,
                    "vendor attempt failed"
                );

                if retry_index + 1 >= policy.max_attempts || !failure.is_retryable() {
                    return Ok(RetryRun {
                        outcome: Err(failure),
                        attempts,
                    });
                }

                let delay = backoff_delay(policy, retry_index, &failure);
                tokio::time::sleep(delay).await;
                retry_index += 1;
            }
        }
    }
}
