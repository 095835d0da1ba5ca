//! SWITCHBOARD LLM layer
//!
//! Normalized request/response shapes, the vendor failure taxonomy, the
//! `VendorAdapter` seam and its registry, plus the retry engine, fallback
//! orchestrator and pricing table built on top of them.
//!
//! Vendor failures are expected traffic, not exceptions: they flow through
//! the retry and fallback layers as values.

pub mod fallback;
pub mod pricing;
pub mod providers;
pub mod retry;

pub use fallback::{run_with_fallback, AllVendorsFailed, FallbackRun, FallbackSuccess};
pub use pricing::{cost_usd, rate, round6, PricingTable};
pub use retry::{backoff_delay, run_retry, RetryRun};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_core::{AttemptOutcome, MessageRole, Vendor};
use thiserror::Error;

// ============================================================================
// NORMALIZED SHAPES
// ============================================================================

/// One turn of conversation history handed to a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

/// Vendor-agnostic request assembled by the conversation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRequest {
    pub system_prompt: String,
    /// Full ascending session history, newest user turn last.
    pub messages: Vec<ChatTurn>,
    /// Ordered tool names from the agent configuration; may be empty.
    pub enabled_tools: Vec<String>,
}

/// Vendor-agnostic success shape. Callers cannot tell which vendor answered
/// except via the attempt labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub text: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    /// Measured by the adapter at its call boundaries; the retry engine keeps
    /// its own timer for attempt records.
    pub latency_ms: i64,
}

// ============================================================================
// FAILURE TAXONOMY
// ============================================================================

/// Normalized vendor failure.
///
/// Retryability is a function of the status code alone:
/// - `>= 500` retryable server error (includes the synthesized 504 timeout)
/// - `429` retryable rate limit, `retry_after_ms` set when the vendor said so
/// - remaining `4xx` non-retryable client errors
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{vendor} request failed with status {status_code} ({error_code}): {message}")]
pub struct VendorFailure {
    pub vendor: Vendor,
    pub status_code: i32,
    pub error_code: String,
    pub message: String,
    pub retry_after_ms: Option<i64>,
}

impl VendorFailure {
    /// Classify an HTTP-shaped failure into the taxonomy.
    pub fn from_status(
        vendor: Vendor,
        status_code: i32,
        error_code: impl Into<String>,
        message: impl Into<String>,
        retry_after_ms: Option<i64>,
    ) -> Self {
        Self {
            vendor,
            status_code,
            error_code: error_code.into(),
            message: message.into(),
            retry_after_ms: if status_code == 429 { retry_after_ms } else { None },
        }
    }

    /// Transport timeout or cancellation of the underlying call.
    pub fn timeout(vendor: Vendor) -> Self {
        Self {
            vendor,
            status_code: 504,
            error_code: "TIMEOUT".to_string(),
            message: "vendor call exceeded the attempt deadline".to_string(),
            retry_after_ms: None,
        }
    }

    /// Anything that escaped classification.
    pub fn unknown(vendor: Vendor, message: impl Into<String>) -> Self {
        Self {
            vendor,
            status_code: 500,
            error_code: "UNKNOWN_ERROR".to_string(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.status_code >= 500 || self.status_code == 429
    }
}

// ============================================================================
// ADAPTER SEAM
// ============================================================================

/// One interchangeable LLM vendor.
///
/// Implementations translate the normalized request into the vendor's wire
/// shape and normalize both success and failure responses. They must be
/// thread-safe and stateless with respect to a send.
#[async_trait]
pub trait VendorAdapter: Send + Sync + std::fmt::Debug {
    /// The wire label attached to attempts produced through this adapter.
    fn vendor(&self) -> Vendor;

    /// Execute one call against the vendor.
    async fn complete(&self, request: &NormalizedRequest)
        -> Result<NormalizedResponse, VendorFailure>;
}

/// Registry of adapters keyed by vendor.
///
/// Adding a vendor is a registration here, not a change to the pipeline.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Vendor, Arc<dyn VendorAdapter>>,
}

/// Resolving an unregistered vendor is a deployment bug and fails loudly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No adapter registered for vendor {0}")]
pub struct UnregisteredVendor(pub Vendor);

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own vendor label, replacing any
    /// previous registration.
    pub fn register(&mut self, adapter: Arc<dyn VendorAdapter>) {
        self.adapters.insert(adapter.vendor(), adapter);
    }

    pub fn get(&self, vendor: Vendor) -> Result<Arc<dyn VendorAdapter>, UnregisteredVendor> {
        self.adapters
            .get(&vendor)
            .cloned()
            .ok_or(UnregisteredVendor(vendor))
    }

    pub fn is_registered(&self, vendor: Vendor) -> bool {
        self.adapters.contains_key(&vendor)
    }
}

// ============================================================================
// ATTEMPT OBSERVATION
// ============================================================================

/// One vendor invocation as seen by the retry engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub vendor: Vendor,
    pub outcome: AttemptOutcome,
    pub http_status: Option<i32>,
    pub latency_ms: i64,
    /// Dense per-vendor index starting at 0.
    pub retry_index: i32,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Failure raised by an observer sink; aborts the run that produced it.
#[derive(Debug, Clone, Error)]
#[error("Attempt observer failed: {0}")]
pub struct ObserverError(pub String);

/// Sink notified of every attempt as it completes, before the engine decides
/// whether to retry. This is what keeps the audit trail truthful when a send
/// dies mid-flight.
#[async_trait]
pub trait AttemptObserver: Send + Sync {
    async fn on_attempt(&self, attempt: &AttemptRecord) -> Result<(), ObserverError>;
}

/// Observer that drops attempts on the floor.
pub struct NullObserver;

#[async_trait]
impl AttemptObserver for NullObserver {
    async fn on_attempt(&self, _attempt: &AttemptRecord) -> Result<(), ObserverError> {
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
