//! SWITCHBOARD Test Utilities
//!
//! Centralized test infrastructure for the workspace:
//! - Scripted vendor adapters with queued outcomes
//! - A recording attempt observer
//! - Store seeding fixtures
//! - Proptest generators

use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use switchboard_core::{Agent, AgentId, Credential, Session, SessionId, Tenant, TenantId, Vendor};
use switchboard_llm::{
    AttemptObserver, AttemptRecord, NormalizedRequest, NormalizedResponse, ObserverError,
    VendorAdapter, VendorFailure,
};
use switchboard_store::{MemoryStore, TenantStore};

// ============================================================================
// SCRIPTED ADAPTER
// ============================================================================

/// One planned outcome for a scripted adapter call.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Succeed {
        text: String,
        tokens_in: i64,
        tokens_out: i64,
    },
    Fail {
        status: i32,
        error_code: String,
        retry_after_ms: Option<i64>,
    },
    /// Answer successfully after a delay; lets tests hold a send in flight
    /// at a deterministic suspension point.
    SucceedAfter {
        delay: Duration,
        text: String,
        tokens_in: i64,
        tokens_out: i64,
    },
    /// Never answer; exercises the per-attempt timeout.
    Hang,
}

impl ScriptedOutcome {
    pub fn ok(tokens_in: i64, tokens_out: i64) -> Self {
        ScriptedOutcome::Succeed {
            text: "scripted response".to_string(),
            tokens_in,
            tokens_out,
        }
    }

    pub fn ok_with_text(text: impl Into<String>, tokens_in: i64, tokens_out: i64) -> Self {
        ScriptedOutcome::Succeed {
            text: text.into(),
            tokens_in,
            tokens_out,
        }
    }

    pub fn fail(status: i32, error_code: impl Into<String>) -> Self {
        ScriptedOutcome::Fail {
            status,
            error_code: error_code.into(),
            retry_after_ms: None,
        }
    }

    pub fn ok_after(delay: Duration, tokens_in: i64, tokens_out: i64) -> Self {
        ScriptedOutcome::SucceedAfter {
            delay,
            text: "scripted response".to_string(),
            tokens_in,
            tokens_out,
        }
    }

    pub fn server_error() -> Self {
        Self::fail(503, "SERVER_ERROR")
    }

    pub fn rate_limited(retry_after_ms: i64) -> Self {
        ScriptedOutcome::Fail {
            status: 429,
            error_code: "RATE_LIMITED".to_string(),
            retry_after_ms: Some(retry_after_ms),
        }
    }
}

/// Vendor adapter driven by a queue of planned outcomes.
///
/// When the queue runs dry the fallback outcome answers every further call,
/// so `ScriptedAdapter::succeeding(...)` behaves like a vendor that always
/// works.
#[derive(Debug)]
pub struct ScriptedAdapter {
    vendor: Vendor,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback_outcome: ScriptedOutcome,
    calls: AtomicU32,
}

impl ScriptedAdapter {
    pub fn with_script(vendor: Vendor, outcomes: Vec<ScriptedOutcome>) -> Self {
        Self {
            vendor,
            script: Mutex::new(outcomes.into()),
            fallback_outcome: ScriptedOutcome::ok(1, 1),
            calls: AtomicU32::new(0),
        }
    }

    /// An adapter that always succeeds with the given token counts.
    pub fn succeeding(vendor: Vendor, tokens_in: i64, tokens_out: i64) -> Self {
        Self {
            vendor,
            script: Mutex::new(VecDeque::new()),
            fallback_outcome: ScriptedOutcome::ok(tokens_in, tokens_out),
            calls: AtomicU32::new(0),
        }
    }

    /// An adapter that always fails with the given status.
    pub fn failing(vendor: Vendor, status: i32, error_code: impl Into<String>) -> Self {
        Self {
            vendor,
            script: Mutex::new(VecDeque::new()),
            fallback_outcome: ScriptedOutcome::fail(status, error_code),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of calls issued so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback_outcome.clone())
    }
}

#[async_trait]
impl VendorAdapter for ScriptedAdapter {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn complete(
        &self,
        _request: &NormalizedRequest,
    ) -> Result<NormalizedResponse, VendorFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            ScriptedOutcome::Succeed {
                text,
                tokens_in,
                tokens_out,
            } => Ok(NormalizedResponse {
                text,
                tokens_in,
                tokens_out,
                latency_ms: 0,
            }),
            ScriptedOutcome::Fail {
                status,
                error_code,
                retry_after_ms,
            } => Err(VendorFailure::from_status(
                self.vendor,
                status,
                error_code,
                "scripted failure",
                retry_after_ms,
            )),
            ScriptedOutcome::SucceedAfter {
                delay,
                text,
                tokens_in,
                tokens_out,
            } => {
                tokio::time::sleep(delay).await;
                Ok(NormalizedResponse {
                    text,
                    tokens_in,
                    tokens_out,
                    latency_ms: delay.as_millis() as i64,
                })
            }
            ScriptedOutcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(VendorFailure::unknown(self.vendor, "scripted hang elapsed"))
            }
        }
    }
}

// ============================================================================
// RECORDING OBSERVER
// ============================================================================

/// Observer that stores every attempt it sees.
#[derive(Default)]
pub struct RecordingObserver {
    attempts: Mutex<Vec<AttemptRecord>>,
}

impl RecordingObserver {
    pub fn recorded(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().expect("attempts mutex poisoned").clone()
    }
}

#[async_trait]
impl AttemptObserver for RecordingObserver {
    async fn on_attempt(&self, attempt: &AttemptRecord) -> Result<(), ObserverError> {
        self.attempts
            .lock()
            .expect("attempts mutex poisoned")
            .push(attempt.clone());
        Ok(())
    }
}

// ============================================================================
// STORE FIXTURES
// ============================================================================

/// Seed a tenant and return its ID.
pub async fn seed_tenant(store: &MemoryStore, name: &str) -> TenantId {
    let tenant = Tenant::new(name);
    let tenant_id = tenant.tenant_id;
    store.insert_tenant(tenant).await.expect("tenant insert");
    tenant_id
}

/// Seed an agent under a tenant.
pub async fn seed_agent(
    store: &MemoryStore,
    tenant_id: TenantId,
    primary: Vendor,
    fallback: Option<Vendor>,
) -> AgentId {
    let agent = Agent::new(tenant_id, "fixture-agent", primary, fallback, "You are concise.")
        .with_tools(vec!["kb_lookup".to_string()]);
    let agent_id = agent.agent_id;
    store.insert_agent(agent).await.expect("agent insert");
    agent_id
}

/// Seed a session under a tenant/agent pair.
pub async fn seed_session(store: &MemoryStore, tenant_id: TenantId, agent_id: AgentId) -> SessionId {
    let session = Session::new(tenant_id, agent_id, "customer-fixture");
    let session_id = session.session_id;
    store.insert_session(session).await.expect("session insert");
    session_id
}

/// Seed a credential for an already-hashed secret.
pub async fn seed_credential_hash(store: &MemoryStore, tenant_id: TenantId, secret_hash: &str) {
    store
        .insert_credential(Credential::new(tenant_id, secret_hash))
        .await
        .expect("credential insert");
}

/// Full workspace fixture: tenant + agent + session.
pub struct WorkspaceFixture {
    pub store: MemoryStore,
    pub tenant_id: TenantId,
    pub agent_id: AgentId,
    pub session_id: SessionId,
}

/// Seed a tenant with one agent (primary + optional fallback) and a session.
pub async fn seed_workspace(primary: Vendor, fallback: Option<Vendor>) -> WorkspaceFixture {
    let store = MemoryStore::new();
    let tenant_id = seed_tenant(&store, "fixture-tenant").await;
    let agent_id = seed_agent(&store, tenant_id, primary, fallback).await;
    let session_id = seed_session(&store, tenant_id, agent_id).await;
    WorkspaceFixture {
        store,
        tenant_id,
        agent_id,
        session_id,
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Non-empty printable message content.
pub fn arb_message_content() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.!?]{1,120}"
}

/// Token counts in a realistic range, zero included.
pub fn arb_token_count() -> impl Strategy<Value = i64> {
    0i64..200_000
}

/// Either vendor.
pub fn arb_vendor() -> impl Strategy<Value = Vendor> {
    prop_oneof![Just(Vendor::VendorA), Just(Vendor::VendorB)]
}

/// Fresh idempotency keys.
pub fn arb_idempotency_key() -> impl Strategy<Value = String> {
    "[a-z0-9-]{8,64}"
}
