//! Timing tests for the retry engine, run under tokio's paused clock so no
//! wall-clock time is spent: rate-limit holds are honored verbatim, backoff
//! stays inside its jitter window, and the per-attempt timeout fires at its
//! deadline.

use std::sync::Mutex;
use switchboard_core::{RetryPolicy, Vendor};
use switchboard_llm::{
    run_retry, AttemptObserver, AttemptRecord, NormalizedRequest, ObserverError,
};
use switchboard_test_utils::{ScriptedAdapter, ScriptedOutcome};
use tokio::time::Instant;

/// Observer capturing the paused-clock instant of each attempt completion.
#[derive(Default)]
struct TimingObserver {
    seen: Mutex<Vec<(i32, Instant)>>,
}

impl TimingObserver {
    fn instants(&self) -> Vec<(i32, Instant)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AttemptObserver for TimingObserver {
    async fn on_attempt(&self, attempt: &AttemptRecord) -> Result<(), ObserverError> {
        self.seen
            .lock()
            .unwrap()
            .push((attempt.retry_index, Instant::now()));
        Ok(())
    }
}

fn request() -> NormalizedRequest {
    NormalizedRequest {
        system_prompt: String::new(),
        messages: Vec::new(),
        enabled_tools: Vec::new(),
    }
}

// ============================================================================
// RATE-LIMIT HOLD (S4)
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_after_hold_is_honored_without_jitter() {
    let adapter = ScriptedAdapter::with_script(
        Vendor::VendorB,
        vec![ScriptedOutcome::rate_limited(750), ScriptedOutcome::ok(5, 5)],
    );
    let observer = TimingObserver::default();

    let run = run_retry(&adapter, &request(), &RetryPolicy::default(), &observer)
        .await
        .unwrap();
    assert!(run.outcome.is_ok());

    let instants = observer.instants();
    assert_eq!(instants.len(), 2);
    let wait = instants[1].1.duration_since(instants[0].1);
    // No earlier than the hold, no later than hold + 150ms slack.
    assert!(wait.as_millis() >= 750, "waited only {}ms", wait.as_millis());
    assert!(wait.as_millis() <= 900, "waited {}ms", wait.as_millis());
}

// ============================================================================
// BACKOFF WINDOW (property 7)
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_stays_in_jitter_window() {
    let adapter = ScriptedAdapter::with_script(
        Vendor::VendorA,
        vec![
            ScriptedOutcome::server_error(),
            ScriptedOutcome::server_error(),
            ScriptedOutcome::ok(1, 1),
        ],
    );
    let observer = TimingObserver::default();

    let run = run_retry(&adapter, &request(), &RetryPolicy::default(), &observer)
        .await
        .unwrap();
    assert!(run.outcome.is_ok());

    let instants = observer.instants();
    assert_eq!(instants.len(), 3);

    // Wait before attempt i+1 must lie in [0.9, 1.1] * 200ms * 2^i.
    for i in 0..2 {
        let wait = instants[i + 1].1.duration_since(instants[i].1).as_millis() as f64;
        let nominal = 200.0 * 2f64.powi(i as i32);
        assert!(
            wait >= (nominal * 0.9).floor(),
            "wait {wait}ms below window before attempt {}",
            i + 1
        );
        assert!(
            wait <= (nominal * 1.1).ceil(),
            "wait {wait}ms above window before attempt {}",
            i + 1
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_capped() {
    // A tiny cap makes the cap observable within two retries.
    let policy = RetryPolicy {
        max_attempts: 3,
        base_backoff: std::time::Duration::from_millis(400),
        max_backoff: std::time::Duration::from_millis(500),
        jitter_fraction: 0.0,
        ..RetryPolicy::default()
    };
    let adapter = ScriptedAdapter::with_script(
        Vendor::VendorA,
        vec![
            ScriptedOutcome::server_error(),
            ScriptedOutcome::server_error(),
            ScriptedOutcome::ok(1, 1),
        ],
    );
    let observer = TimingObserver::default();

    run_retry(&adapter, &request(), &policy, &observer).await.unwrap();

    let instants = observer.instants();
    // Second wait would be 800ms uncapped; the cap holds it at 500ms.
    let second_wait = instants[2].1.duration_since(instants[1].1);
    assert_eq!(second_wait.as_millis(), 500);
}

// ============================================================================
// PER-ATTEMPT TIMEOUT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_at_attempt_deadline() {
    let adapter = ScriptedAdapter::with_script(
        Vendor::VendorA,
        vec![ScriptedOutcome::Hang, ScriptedOutcome::ok(1, 1)],
    );
    let observer = TimingObserver::default();

    let run = run_retry(&adapter, &request(), &RetryPolicy::default(), &observer)
        .await
        .unwrap();

    assert!(run.outcome.is_ok());
    assert_eq!(run.attempts[0].error_code.as_deref(), Some("TIMEOUT"));
    // The timed-out attempt's latency is the full attempt budget.
    assert!(run.attempts[0].latency_ms >= 2000);
}
