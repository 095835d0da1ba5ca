//! Error Types for the SWITCHBOARD gateway
//!
//! The gateway surfaces a small closed set of error codes. Recoverable vendor
//! failures never reach this layer - they are consumed by the retry engine
//! and fallback orchestrator; only total exhaustion surfaces, with its attempt
//! audit attached.

use crate::envelope::AttemptView;
use serde::{Deserialize, Serialize};
use std::fmt;
use switchboard_core::{AgentId, SessionId, StorageError};
use switchboard_llm::AllVendorsFailed;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Wire-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A send arrived without an idempotency key.
    IdempotencyKeyRequired,

    /// The session does not exist in this tenant.
    SessionNotFound,

    /// The session's agent no longer exists in this tenant.
    AgentNotFound,

    /// Primary and fallback vendors were both exhausted.
    AllProvidersFailed,

    /// The credential resolved to no tenant.
    InvalidApiKey,

    /// Another request holds this idempotency key mid-flight. The transport
    /// maps this to a retryable conflict.
    RequestInFlight,

    /// Strict fingerprint mode: the key was reused with a different payload.
    IdempotencyKeyReused,

    /// Programmer error or store failure.
    InternalError,
}

impl ErrorCode {
    /// Default message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::IdempotencyKeyRequired => "An idempotency key is required",
            ErrorCode::SessionNotFound => "Session not found",
            ErrorCode::AgentNotFound => "Agent not found",
            ErrorCode::AllProvidersFailed => "All providers failed",
            ErrorCode::InvalidApiKey => "Invalid API key",
            ErrorCode::RequestInFlight => "A request with this idempotency key is in flight",
            ErrorCode::IdempotencyKeyReused => "Idempotency key reused with a different payload",
            ErrorCode::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// GATEWAY ERROR
// ============================================================================

/// Structured error returned by the send pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GatewayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn idempotency_key_required() -> Self {
        Self::new(
            ErrorCode::IdempotencyKeyRequired,
            "Field 'idempotencyKey' is required and must be 1-256 characters",
        )
    }

    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::new(
            ErrorCode::SessionNotFound,
            format!("Session {} not found", session_id),
        )
    }

    pub fn agent_not_found(agent_id: AgentId) -> Self {
        Self::new(
            ErrorCode::AgentNotFound,
            format!("Agent {} not found", agent_id),
        )
    }

    pub fn invalid_api_key() -> Self {
        Self::new(ErrorCode::InvalidApiKey, "Invalid API key")
    }

    pub fn request_in_flight(key: &str) -> Self {
        Self::new(
            ErrorCode::RequestInFlight,
            format!("A request with idempotency key '{}' is already in flight", key),
        )
    }

    pub fn idempotency_key_reused(key: &str) -> Self {
        Self::new(
            ErrorCode::IdempotencyKeyReused,
            format!("Idempotency key '{}' was reused with a different payload", key),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Build the exhaustion error, attaching the vendor labels and the full
    /// attempt audit so clients can see what was tried.
    pub fn all_providers_failed(failed: &AllVendorsFailed, attempts: &[AttemptView]) -> Self {
        Self::new(
            ErrorCode::AllProvidersFailed,
            format!(
                "All providers failed after {} attempts; last error: {}",
                attempts.len(),
                failed
                    .fallback_failure
                    .as_ref()
                    .unwrap_or(&failed.primary_failure)
            ),
        )
        .with_details(serde_json::json!({
            "primaryVendor": failed.primary_vendor,
            "fallbackVendor": failed.fallback_vendor,
            "attempts": attempts,
        }))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "store failure surfaced to pipeline");
        Self::internal_error(format!("Store operation failed: {}", err))
    }
}

// ============================================================================
// ERROR ENVELOPE
// ============================================================================

/// Wire error shape produced for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub request_id: String,
}

impl ErrorEnvelope {
    pub fn from_error(error: GatewayError, request_id: impl Into<String>) -> Self {
        Self {
            code: error.code,
            message: error.message,
            details: error.details,
            request_id: request_id.into(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
