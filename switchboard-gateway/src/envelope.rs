//! Response envelope
//!
//! The success shape returned by a send, serialized exactly once at
//! completion time and stored verbatim in the idempotency record. On replay
//! the stored bytes are deserialized and only `metadata.idempotency.replayed`
//! flips to `true`.

use serde::{Deserialize, Serialize};
use switchboard_core::{
    AgentId, AttemptOutcome, Message, MessageId, MessageRole, SessionId, Timestamp, Vendor,
};
use switchboard_llm::{pricing, AttemptRecord};

/// Full success envelope for a completed send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageEnvelope {
    pub message: EnvelopeMessage,
    pub metadata: EnvelopeMetadata,
}

/// The assistant message as the client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: Timestamp,
}

impl From<&Message> for EnvelopeMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.message_id,
            session_id: message.session_id,
            role: message.role,
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    pub agent_id: AgentId,
    /// The vendor whose response was returned.
    pub provider_used: Vendor,
    pub primary_attempted: Vendor,
    pub fallback_attempted: Option<Vendor>,
    pub fallback_used: bool,
    pub attempts: Vec<AttemptView>,
    pub usage: UsageView,
    pub idempotency: IdempotencyView,
    pub request_id: String,
}

/// One attempt row as surfaced to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub provider: Vendor,
    pub status: AttemptOutcome,
    pub http_status: Option<i32>,
    pub latency_ms: i64,
    /// Dense per-vendor retry index starting at 0.
    pub retries: i32,
    pub error_code: Option<String>,
}

impl From<&AttemptRecord> for AttemptView {
    fn from(record: &AttemptRecord) -> Self {
        Self {
            provider: record.vendor,
            status: record.outcome,
            http_status: record.http_status,
            latency_ms: record.latency_ms,
            retries: record.retry_index,
            error_code: record.error_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageView {
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_usd: f64,
    pub pricing: PricingView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingView {
    pub usd_per_1k_tokens: f64,
}

impl PricingView {
    pub fn for_vendor(vendor: Vendor) -> Self {
        Self {
            usd_per_1k_tokens: pricing::rate(vendor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyView {
    pub key: String,
    pub replayed: bool,
}

// ============================================================================
// TESTS
// ============================================================================
