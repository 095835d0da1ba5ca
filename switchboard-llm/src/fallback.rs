//! Fallback orchestrator
//!
//! Runs the retry engine against the primary adapter and, only after the
//! primary exhausts its attempts, against the optional fallback. There is no
//! tie-break: primary always goes first, and the merged attempt stream keeps
//! invocation order.

use crate::{
    run_retry, AttemptObserver, AttemptRecord, NormalizedRequest, NormalizedResponse,
    ObserverError, VendorAdapter, VendorFailure,
};
use switchboard_core::{RetryPolicy, Vendor};
use thiserror::Error;

/// Successful outcome of a primary/fallback run.
#[derive(Debug, Clone)]
pub struct FallbackSuccess {
    /// The vendor whose response is being returned.
    pub winning_vendor: Vendor,
    pub response: NormalizedResponse,
    pub fallback_used: bool,
}

/// Aggregate failure once every configured vendor has been exhausted.
#[derive(Debug, Clone, Error)]
#[error("All providers failed: primary {primary_vendor} ({primary_failure}), fallback {fallback_vendor:?}")]
pub struct AllVendorsFailed {
    pub primary_vendor: Vendor,
    pub primary_failure: VendorFailure,
    pub fallback_vendor: Option<Vendor>,
    pub fallback_failure: Option<VendorFailure>,
}

/// Result of one orchestrated run, failures included.
#[derive(Debug, Clone)]
pub struct FallbackRun {
    pub outcome: Result<FallbackSuccess, AllVendorsFailed>,
    /// Primary attempts followed by fallback attempts, order preserved.
    pub attempts: Vec<AttemptRecord>,
}

/// Drive `primary` and then, if it fails entirely, `fallback`.
pub async fn run_with_fallback(
    primary: &dyn VendorAdapter,
    fallback: Option<&dyn VendorAdapter>,
    request: &NormalizedRequest,
    policy: &RetryPolicy,
    observer: &dyn AttemptObserver,
) -> Result<FallbackRun, ObserverError> {
    let primary_vendor = primary.vendor();
    let mut run = run_retry(primary, request, policy, observer).await?;

    let primary_failure = match run.outcome {
        Ok(response) => {
            return Ok(FallbackRun {
                outcome: Ok(FallbackSuccess {
                    winning_vendor: primary_vendor,
                    response,
                    fallback_used: false,
                }),
                attempts: run.attempts,
            });
        }
        Err(failure) => failure,
    };

    let Some(fallback) = fallback else {
        return Ok(FallbackRun {
            outcome: Err(AllVendorsFailed {
                primary_vendor,
                primary_failure,
                fallback_vendor: None,
                fallback_failure: None,
            }),
            attempts: run.attempts,
        });
    };

    let fallback_vendor = fallback.vendor();
    tracing::warn!(
        primary = %primary_vendor,
        fallback = %fallback_vendor,
        "primary vendor exhausted, engaging fallback"
    );

    let fallback_run = run_retry(fallback, request, policy, observer).await?;
    run.attempts.extend(fallback_run.attempts);

    match fallback_run.outcome {
        Ok(response) => Ok(FallbackRun {
            outcome: Ok(FallbackSuccess {
                winning_vendor: fallback_vendor,
                response,
                fallback_used: true,
            }),
            attempts: run.attempts,
        }),
        Err(fallback_failure) => Ok(FallbackRun {
            outcome: Err(AllVendorsFailed {
                primary_vendor,
                primary_failure,
                fallback_vendor: Some(fallback_vendor),
                fallback_failure: Some(fallback_failure),
            }),
            attempts: run.attempts,
        }),
    }
}
