//! Core entity structures

use crate::{
    AgentId, AttemptId, AttemptOutcome, CredentialId, EntityIdType, MessageId, MessageRole,
    SessionId, SessionStatus, TenantId, Timestamp, UsageEventId, Vendor,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Tenant - an isolated customer namespace.
///
/// The tenant is the unit of authentication and ownership; deleting a tenant
/// cascades to everything it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub created_at: Timestamp,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            tenant_id: TenantId::now_v7(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// API credential resolving to a tenant.
///
/// Only the SHA-256 hex digest of the opaque key is ever stored; the
/// plaintext never touches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub credential_id: CredentialId,
    pub tenant_id: TenantId,
    pub secret_hash: String,
    pub created_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
}

impl Credential {
    pub fn new(tenant_id: TenantId, secret_hash: impl Into<String>) -> Self {
        Self {
            credential_id: CredentialId::now_v7(),
            tenant_id,
            secret_hash: secret_hash.into(),
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}

/// Agent - a tenant-owned configuration that parameterizes sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub tenant_id: TenantId,
    pub name: String,
    pub primary_vendor: Vendor,
    /// Secondary vendor tried only after the primary exhausts its retries.
    /// Must differ from `primary_vendor` when set.
    pub fallback_vendor: Option<Vendor>,
    pub system_prompt: String,
    /// Ordered tool names forwarded to the vendor; may be empty.
    pub enabled_tools: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Agent {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        primary_vendor: Vendor,
        fallback_vendor: Option<Vendor>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_id: AgentId::now_v7(),
            tenant_id,
            name: name.into(),
            primary_vendor,
            fallback_vendor,
            system_prompt: system_prompt.into(),
            enabled_tools: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.enabled_tools = tools;
        self
    }

    /// Check the fallback invariant: `fallback_vendor != primary_vendor`.
    pub fn fallback_is_valid(&self) -> bool {
        self.fallback_vendor != Some(self.primary_vendor)
    }
}

/// Session - a conversation thread between one agent and one end-customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    pub agent_id: AgentId,
    /// Opaque tenant-supplied end-customer identifier.
    pub customer_id: String,
    pub status: SessionStatus,
    pub created_at: Timestamp,
    pub last_activity_at: Timestamp,
    pub metadata: Option<serde_json::Value>,
}

impl Session {
    pub fn new(tenant_id: TenantId, agent_id: AgentId, customer_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::now_v7(),
            tenant_id,
            agent_id,
            customer_id: customer_id.into(),
            status: SessionStatus::Active,
            created_at: now,
            last_activity_at: now,
            metadata: None,
        }
    }
}

/// Message - one turn in a session, append-only.
///
/// Messages within a session are totally ordered by `created_at` with a
/// stable tie-break on `message_id` (v7, time-ordered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: Timestamp,
}

/// Attempt log entry - one vendor invocation on behalf of one send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptLog {
    pub attempt_id: AttemptId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub vendor: Vendor,
    pub outcome: AttemptOutcome,
    pub http_status: Option<i32>,
    pub latency_ms: i64,
    /// Dense per-vendor retry index starting at 0.
    pub retry_index: i32,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub request_id: String,
    pub created_at: Timestamp,
}

/// Usage event - the billing row produced once per successful send.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub usage_event_id: UsageEventId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    /// The vendor that actually answered.
    pub vendor: Vendor,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_usd: f64,
    pub request_id: String,
    pub created_at: Timestamp,
}

impl UsageEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: TenantId,
        session_id: SessionId,
        agent_id: AgentId,
        vendor: Vendor,
        tokens_in: i64,
        tokens_out: i64,
        cost_usd: f64,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            usage_event_id: UsageEventId::now_v7(),
            tenant_id,
            session_id,
            agent_id,
            vendor,
            tokens_in,
            tokens_out,
            cost_usd,
            request_id: request_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Idempotency record - write-once-then-complete guard for a client key.
///
/// Inserted with `response = None` when processing begins; `response` is set
/// exactly once on successful completion and is never otherwise mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub tenant_id: TenantId,
    pub scope: String,
    pub idempotency_key: String,
    pub session_id: Option<SessionId>,
    /// Hex SHA-256 of the normalized request payload.
    pub request_fingerprint: String,
    /// Serialized response envelope, populated on completion.
    pub response: Option<Vec<u8>>,
    pub created_at: Timestamp,
}

impl IdempotencyRecord {
    pub fn pending(
        tenant_id: TenantId,
        scope: impl Into<String>,
        idempotency_key: impl Into<String>,
        session_id: Option<SessionId>,
        request_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            scope: scope.into(),
            idempotency_key: idempotency_key.into(),
            session_id,
            request_fingerprint: request_fingerprint.into(),
            response: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this record has been completed with a response.
    pub fn is_completed(&self) -> bool {
        self.response.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_fallback_invariant() {
        let tenant = TenantId::now_v7();
        let ok = Agent::new(tenant, "support", Vendor::VendorA, Some(Vendor::VendorB), "be helpful");
        assert!(ok.fallback_is_valid());

        let none = Agent::new(tenant, "support", Vendor::VendorA, None, "be helpful");
        assert!(none.fallback_is_valid());

        let bad = Agent::new(tenant, "support", Vendor::VendorA, Some(Vendor::VendorA), "be helpful");
        assert!(!bad.fallback_is_valid());
    }

    #[test]
    fn test_idempotency_record_lifecycle() {
        let tenant = TenantId::now_v7();
        let mut record = IdempotencyRecord::pending(tenant, "send_message", "k1", None, "fp");
        assert!(!record.is_completed());
        record.response = Some(b"{}".to_vec());
        assert!(record.is_completed());
    }
}
