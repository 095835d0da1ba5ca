//! Conversation pipeline
//!
//! Top-level orchestrator of a send:
//! idempotency gate -> session/agent loads -> persist user turn -> fallback
//! orchestrator -> persist assistant turn -> record usage -> complete the
//! idempotency record -> return the envelope.
//!
//! Attempts are written through the store as they happen, so a send that
//! dies mid-flight leaves a truthful partial audit. On total vendor failure
//! the user turn and the attempt rows remain, the assistant turn and usage
//! row are never written, and the idempotency record stays incomplete so the
//! client may retry with the same key.

use crate::auth::AuthContext;
use crate::config::GatewayConfig;
use crate::envelope::{
    AttemptView, EnvelopeMessage, EnvelopeMetadata, IdempotencyView, PricingView,
    SendMessageEnvelope, UsageView,
};
use crate::error::GatewayError;
use crate::idempotency::{request_fingerprint, BeginSend, IdempotencyGate, MAX_KEY_LENGTH};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use switchboard_core::{
    Agent, AgentId, AttemptId, AttemptLog, EntityIdType, MessageRole, SessionId, TenantId,
    UsageEvent,
};
use switchboard_llm::{
    cost_usd, run_with_fallback, AdapterRegistry, AttemptObserver, AttemptRecord, ChatTurn,
    NormalizedRequest, ObserverError,
};
use switchboard_store::TenantStore;

/// Input of one send, with the tenant already resolved by the auth gate and
/// the request id generated by the transport.
#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub idempotency_key: Option<String>,
    pub content: String,
    pub request_id: String,
}

impl SendMessageRequest {
    /// Convenience constructor from an authenticated context.
    pub fn new(
        auth: &AuthContext,
        session_id: SessionId,
        idempotency_key: impl Into<String>,
        content: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: auth.tenant_id,
            session_id,
            idempotency_key: Some(idempotency_key.into()),
            content: content.into(),
            request_id: request_id.into(),
        }
    }
}

/// The send pipeline. Everything it touches is injected: the tenant-scoped
/// store, the adapter registry and the retry configuration.
#[derive(Clone)]
pub struct ConversationPipeline {
    store: Arc<dyn TenantStore>,
    adapters: AdapterRegistry,
    config: GatewayConfig,
    gate: IdempotencyGate,
}

impl ConversationPipeline {
    pub fn new(store: Arc<dyn TenantStore>, adapters: AdapterRegistry, config: GatewayConfig) -> Self {
        let gate = IdempotencyGate::new(Arc::clone(&store), &config);
        Self {
            store,
            adapters,
            config,
            gate,
        }
    }

    /// Execute one send end to end.
    #[tracing::instrument(
        name = "send_message",
        skip(self, request),
        fields(
            tenant_id = %request.tenant_id,
            session_id = %request.session_id,
            request_id = %request.request_id,
        )
    )]
    pub async fn send(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageEnvelope, GatewayError> {
        let tenant_id = request.tenant_id;
        let session_id = request.session_id;

        // The key is the contract: without one, replay safety is impossible.
        let key = match request.idempotency_key.as_deref() {
            Some(key) if !key.is_empty() && key.len() <= MAX_KEY_LENGTH => key.to_string(),
            _ => return Err(GatewayError::idempotency_key_required()),
        };

        let fingerprint = request_fingerprint(tenant_id, session_id, &request.content);
        match self.gate.begin(tenant_id, session_id, &key, &fingerprint).await? {
            BeginSend::Replay(envelope) => return Ok(envelope),
            BeginSend::InFlight => return Err(GatewayError::request_in_flight(&key)),
            BeginSend::Started => {}
        }

        let session = self
            .store
            .find_session(tenant_id, session_id)
            .await?
            .ok_or_else(|| GatewayError::session_not_found(session_id))?;

        let agent = self
            .store
            .find_agent(tenant_id, session.agent_id)
            .await?
            .ok_or_else(|| GatewayError::agent_not_found(session.agent_id))?;

        // Persist the user turn before any vendor call. A total vendor
        // failure still leaves what the user said on record.
        self.store
            .append_message(tenant_id, session_id, MessageRole::User, &request.content)
            .await?;
        self.store.touch_session_activity(tenant_id, session_id).await?;

        let normalized = self.assemble_request(&agent, tenant_id, session_id).await?;

        let primary = self
            .adapters
            .get(agent.primary_vendor)
            .map_err(|e| GatewayError::internal_error(e.to_string()))?;
        let fallback = match agent.fallback_vendor {
            Some(vendor) => Some(
                self.adapters
                    .get(vendor)
                    .map_err(|e| GatewayError::internal_error(e.to_string()))?,
            ),
            None => None,
        };

        let observer = StoreAttemptObserver {
            store: Arc::clone(&self.store),
            tenant_id,
            session_id,
            agent_id: agent.agent_id,
            request_id: request.request_id.clone(),
        };

        let run = run_with_fallback(
            primary.as_ref(),
            fallback.as_deref(),
            &normalized,
            &self.config.retry,
            &observer,
        )
        .await
        .map_err(|e: ObserverError| GatewayError::internal_error(e.to_string()))?;

        let attempt_views: Vec<AttemptView> = run.attempts.iter().map(AttemptView::from).collect();

        let success = match run.outcome {
            Ok(success) => success,
            Err(failed) => {
                tracing::warn!(
                    primary = %failed.primary_vendor,
                    fallback = ?failed.fallback_vendor,
                    attempts = attempt_views.len(),
                    "send exhausted every vendor"
                );
                return Err(GatewayError::all_providers_failed(&failed, &attempt_views));
            }
        };

        let assistant = self
            .store
            .append_message(
                tenant_id,
                session_id,
                MessageRole::Assistant,
                &success.response.text,
            )
            .await?;

        let cost = cost_usd(
            success.winning_vendor,
            success.response.tokens_in,
            success.response.tokens_out,
        );
        self.store
            .record_usage(
                tenant_id,
                UsageEvent::new(
                    tenant_id,
                    session_id,
                    agent.agent_id,
                    success.winning_vendor,
                    success.response.tokens_in,
                    success.response.tokens_out,
                    cost,
                    request.request_id.clone(),
                ),
            )
            .await?;

        let envelope = SendMessageEnvelope {
            message: EnvelopeMessage::from(&assistant),
            metadata: EnvelopeMetadata {
                agent_id: agent.agent_id,
                provider_used: success.winning_vendor,
                primary_attempted: agent.primary_vendor,
                fallback_attempted: agent.fallback_vendor,
                fallback_used: success.fallback_used,
                attempts: attempt_views,
                usage: UsageView {
                    tokens_in: success.response.tokens_in,
                    tokens_out: success.response.tokens_out,
                    cost_usd: cost,
                    pricing: PricingView::for_vendor(success.winning_vendor),
                },
                idempotency: IdempotencyView {
                    key: key.clone(),
                    replayed: false,
                },
                request_id: request.request_id.clone(),
            },
        };

        // Serialize exactly once; the stored bytes are the source of truth
        // for every replay.
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|e| GatewayError::internal_error(format!("envelope serialization failed: {e}")))?;
        self.gate.complete(tenant_id, &key, &bytes).await?;

        tracing::debug!(
            provider = %envelope.metadata.provider_used,
            fallback_used = envelope.metadata.fallback_used,
            cost_usd = cost,
            "send completed"
        );
        Ok(envelope)
    }

    /// Full ascending history, including the just-appended user turn.
    async fn assemble_request(
        &self,
        agent: &Agent,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<NormalizedRequest, GatewayError> {
        let history = self.store.list_session_messages(tenant_id, session_id).await?;
        Ok(NormalizedRequest {
            system_prompt: agent.system_prompt.clone(),
            messages: history
                .into_iter()
                .map(|message| ChatTurn {
                    role: message.role,
                    content: message.content,
                })
                .collect(),
            enabled_tools: agent.enabled_tools.clone(),
        })
    }
}

/// Observer that lands every attempt in the store the moment it completes.
struct StoreAttemptObserver {
    store: Arc<dyn TenantStore>,
    tenant_id: TenantId,
    session_id: SessionId,
    agent_id: AgentId,
    request_id: String,
}

#[async_trait]
impl AttemptObserver for StoreAttemptObserver {
    async fn on_attempt(&self, attempt: &AttemptRecord) -> Result<(), ObserverError> {
        let row = AttemptLog {
            attempt_id: AttemptId::now_v7(),
            tenant_id: self.tenant_id,
            session_id: self.session_id,
            agent_id: self.agent_id,
            vendor: attempt.vendor,
            outcome: attempt.outcome,
            http_status: attempt.http_status,
            latency_ms: attempt.latency_ms,
            retry_index: attempt.retry_index,
            error_code: attempt.error_code.clone(),
            error_message: attempt.error_message.clone(),
            request_id: self.request_id.clone(),
            created_at: Utc::now(),
        };
        self.store
            .record_attempts(self.tenant_id, &[row])
            .await
            .map_err(|e| ObserverError(e.to_string()))
    }
}
