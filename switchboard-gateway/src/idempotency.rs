//! Idempotency protocol
//!
//! Lookup-and-replay over the store's unique `(tenant, scope, key)` index.
//! The protocol for a send under key K:
//!
//! 1. Lookup. A completed record replays its stored envelope; a live
//!    placeholder signals a concurrent duplicate (conflict); an abandoned
//!    placeholder falls through to the insert, which takes it over.
//! 2. Guarded insert of a fresh placeholder. Losing the insert race
//!    re-examines the winner's record exactly once.
//! 3. Completion sets the serialized envelope exactly once - the single
//!    visibility point for replays.

use crate::config::GatewayConfig;
use crate::envelope::SendMessageEnvelope;
use crate::error::GatewayError;
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::{sha256_hex, IdempotencyRecord, SessionId, TenantId};
use switchboard_store::{IdempotencyInsert, TenantStore};

/// Scope shared by text and voice sends; the fingerprint differs.
pub const SEND_MESSAGE_SCOPE: &str = "send_message";

/// Maximum accepted key length.
pub const MAX_KEY_LENGTH: usize = 256;

/// Fingerprint of the normalized request payload.
pub fn request_fingerprint(tenant_id: TenantId, session_id: SessionId, content: &str) -> String {
    let tenant = tenant_id.to_string();
    let session = session_id.to_string();
    sha256_hex(&[tenant.as_bytes(), session.as_bytes(), content.as_bytes()])
}

/// How a send may proceed after the idempotency gate.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginSend {
    /// The key was completed earlier; here is its envelope, `replayed` set.
    Replay(SendMessageEnvelope),
    /// Another request holds the key mid-flight.
    InFlight,
    /// This request owns the key and must run the pipeline.
    Started,
}

/// Gate guarding the send pipeline behind the idempotency index.
#[derive(Clone)]
pub struct IdempotencyGate {
    store: Arc<dyn TenantStore>,
    strict_fingerprint: bool,
    in_flight_ttl: Duration,
}

impl IdempotencyGate {
    pub fn new(store: Arc<dyn TenantStore>, config: &GatewayConfig) -> Self {
        Self {
            store,
            strict_fingerprint: config.strict_fingerprint,
            in_flight_ttl: config.in_flight_ttl,
        }
    }

    /// Run steps 1-3 of the protocol for key `key`.
    pub async fn begin(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
        key: &str,
        fingerprint: &str,
    ) -> Result<BeginSend, GatewayError> {
        if let Some(record) = self
            .store
            .idempotency_lookup(tenant_id, SEND_MESSAGE_SCOPE, key)
            .await?
        {
            self.check_fingerprint(&record, fingerprint, key)?;
            if record.is_completed() {
                return Ok(BeginSend::Replay(replay_envelope(&record)?));
            }
            let age = chrono::Utc::now() - record.created_at;
            if age < chrono::Duration::from_std(self.in_flight_ttl).unwrap_or(chrono::Duration::MAX)
            {
                return Ok(BeginSend::InFlight);
            }
            // Abandoned placeholder: fall through and let the guarded insert
            // take the key over.
        }

        match self
            .store
            .idempotency_insert(
                tenant_id,
                SEND_MESSAGE_SCOPE,
                key,
                Some(session_id),
                fingerprint,
                self.in_flight_ttl,
            )
            .await?
        {
            IdempotencyInsert::Inserted(_) => Ok(BeginSend::Started),
            // Lost the race; re-examine the winner's record once.
            IdempotencyInsert::Existing(record) => {
                self.check_fingerprint(&record, fingerprint, key)?;
                if record.is_completed() {
                    Ok(BeginSend::Replay(replay_envelope(&record)?))
                } else {
                    tracing::debug!(%tenant_id, key, "idempotency key held by concurrent request");
                    Ok(BeginSend::InFlight)
                }
            }
        }
    }

    /// Step 4: persist the serialized envelope. Until this commits, replays
    /// of the key do not see a completed response.
    pub async fn complete(
        &self,
        tenant_id: TenantId,
        key: &str,
        response: &[u8],
    ) -> Result<(), GatewayError> {
        self.store
            .idempotency_complete(tenant_id, SEND_MESSAGE_SCOPE, key, response)
            .await?;
        Ok(())
    }

    fn check_fingerprint(
        &self,
        record: &IdempotencyRecord,
        fingerprint: &str,
        key: &str,
    ) -> Result<(), GatewayError> {
        if self.strict_fingerprint && record.request_fingerprint != fingerprint {
            return Err(GatewayError::idempotency_key_reused(key));
        }
        Ok(())
    }
}

fn replay_envelope(record: &IdempotencyRecord) -> Result<SendMessageEnvelope, GatewayError> {
    let bytes = record.response.as_deref().ok_or_else(|| {
        GatewayError::internal_error("replay requested for an incomplete idempotency record")
    })?;
    let mut envelope: SendMessageEnvelope = serde_json::from_slice(bytes).map_err(|e| {
        GatewayError::internal_error(format!("stored response envelope is unreadable: {e}"))
    })?;
    envelope.metadata.idempotency.replayed = true;
    tracing::debug!(
        key = %record.idempotency_key,
        "returning replayed response for idempotency key"
    );
    Ok(envelope)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use switchboard_core::EntityIdType;
    use switchboard_store::MemoryStore;

    fn gate(store: &MemoryStore, strict: bool) -> IdempotencyGate {
        IdempotencyGate::new(
            Arc::new(store.clone()),
            &GatewayConfig {
                strict_fingerprint: strict,
                ..GatewayConfig::default()
            },
        )
    }

    fn stored_envelope_bytes(key: &str) -> Vec<u8> {
        // A minimal but well-formed envelope, as the pipeline would store it.
        let json = serde_json::json!({
            "message": {
                "id": "00000000-0000-0000-0000-000000000000",
                "sessionId": "00000000-0000-0000-0000-000000000000",
                "role": "assistant",
                "content": "cached",
                "createdAt": "2026-01-01T00:00:00Z"
            },
            "metadata": {
                "agentId": "00000000-0000-0000-0000-000000000000",
                "providerUsed": "vendorA",
                "primaryAttempted": "vendorA",
                "fallbackAttempted": null,
                "fallbackUsed": false,
                "attempts": [],
                "usage": {
                    "tokensIn": 1, "tokensOut": 2, "costUsd": 0.0,
                    "pricing": {"usdPer1kTokens": 0.002}
                },
                "idempotency": {"key": key, "replayed": false},
                "requestId": "req-cached"
            }
        });
        serde_json::to_vec(&json).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_key_starts() {
        let store = MemoryStore::new();
        let gate = gate(&store, false);
        let tenant = TenantId::now_v7();
        let session = SessionId::now_v7();

        let outcome = gate.begin(tenant, session, "k1", "fp").await.unwrap();
        assert_eq!(outcome, BeginSend::Started);
        assert!(store.idempotency_record(tenant, SEND_MESSAGE_SCOPE, "k1").is_some());
    }

    #[tokio::test]
    async fn test_live_placeholder_conflicts() {
        let store = MemoryStore::new();
        let gate = gate(&store, false);
        let tenant = TenantId::now_v7();
        let session = SessionId::now_v7();

        assert_eq!(gate.begin(tenant, session, "k1", "fp").await.unwrap(), BeginSend::Started);
        assert_eq!(gate.begin(tenant, session, "k1", "fp").await.unwrap(), BeginSend::InFlight);
    }

    #[tokio::test]
    async fn test_completed_key_replays_with_flag_flipped() {
        let store = MemoryStore::new();
        let gate = gate(&store, false);
        let tenant = TenantId::now_v7();
        let session = SessionId::now_v7();

        gate.begin(tenant, session, "k1", "fp").await.unwrap();
        gate.complete(tenant, "k1", &stored_envelope_bytes("k1")).await.unwrap();

        match gate.begin(tenant, session, "k1", "fp").await.unwrap() {
            BeginSend::Replay(envelope) => {
                assert!(envelope.metadata.idempotency.replayed);
                assert_eq!(envelope.message.content, "cached");
            }
            other => panic!("expected replay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_strict_fingerprint_rejects_mismatch() {
        let store = MemoryStore::new();
        let strict = gate(&store, true);
        let tenant = TenantId::now_v7();
        let session = SessionId::now_v7();

        strict.begin(tenant, session, "k1", "fp-original").await.unwrap();
        strict.complete(tenant, "k1", &stored_envelope_bytes("k1")).await.unwrap();

        let err = strict
            .begin(tenant, session, "k1", "fp-different")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IdempotencyKeyReused);

        // Matching fingerprint still replays.
        assert!(matches!(
            strict.begin(tenant, session, "k1", "fp-original").await.unwrap(),
            BeginSend::Replay(_)
        ));
    }

    #[tokio::test]
    async fn test_lenient_mode_ignores_fingerprint_mismatch() {
        let store = MemoryStore::new();
        let lenient = gate(&store, false);
        let tenant = TenantId::now_v7();
        let session = SessionId::now_v7();

        lenient.begin(tenant, session, "k1", "fp-a").await.unwrap();
        lenient.complete(tenant, "k1", &stored_envelope_bytes("k1")).await.unwrap();

        assert!(matches!(
            lenient.begin(tenant, session, "k1", "fp-b").await.unwrap(),
            BeginSend::Replay(_)
        ));
    }

    #[tokio::test]
    async fn test_abandoned_placeholder_is_retaken() {
        let store = MemoryStore::new();
        let tenant = TenantId::now_v7();
        let session = SessionId::now_v7();
        let gate = IdempotencyGate::new(
            Arc::new(store.clone()),
            &GatewayConfig {
                in_flight_ttl: Duration::ZERO,
                ..GatewayConfig::default()
            },
        );

        assert_eq!(gate.begin(tenant, session, "k1", "fp").await.unwrap(), BeginSend::Started);
        // With a zero TTL the placeholder is immediately abandoned; the same
        // key can be taken over by the retry.
        assert_eq!(gate.begin(tenant, session, "k1", "fp").await.unwrap(), BeginSend::Started);
    }

    #[test]
    fn test_fingerprint_depends_on_every_part() {
        let tenant_a = TenantId::now_v7();
        let tenant_b = TenantId::now_v7();
        let session = SessionId::now_v7();

        let base = request_fingerprint(tenant_a, session, "hello");
        assert_eq!(base, request_fingerprint(tenant_a, session, "hello"));
        assert_ne!(base, request_fingerprint(tenant_b, session, "hello"));
        assert_ne!(base, request_fingerprint(tenant_a, session, "world"));
    }
}
