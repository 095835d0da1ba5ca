//! SWITCHBOARD Store
//!
//! The tenant-scoped persistence contract consumed by the conversation
//! pipeline, plus the in-memory reference backend. Every read and write
//! takes the owning `TenantId`; handing a wrong tenant in answers with
//! not-found or an empty result, never with another tenant's row.
//!
//! The idempotency table's unique `(tenant, scope, key)` index is the only
//! load-bearing synchronization primitive in the system: concurrent
//! duplicate sends race on `idempotency_insert` and exactly one wins.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::time::Duration;
use switchboard_core::{
    Agent, AgentId, AttemptLog, Credential, CredentialId, IdempotencyRecord, Message, MessageRole,
    Session, SessionId, StorageError, Tenant, TenantId, Timestamp, UsageEvent,
};

/// Outcome of a guarded idempotency insert.
///
/// Callers must distinguish a fresh insert (this request owns the key) from
/// an existing row (another request got there first).
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyInsert {
    /// The placeholder row was inserted; the caller owns the send.
    Inserted(IdempotencyRecord),
    /// The unique index already held a row for `(tenant, scope, key)`.
    Existing(IdempotencyRecord),
}

/// Tenant-scoped persistence used by the send pipeline.
///
/// Implementations must uphold:
/// - unique `(tenant_id, scope, idempotency_key)` on idempotency records;
/// - unique `secret_hash` across credentials;
/// - unique `request_id` across usage events (loud failure on duplicates);
/// - `append_message` assigns `created_at` monotonically within a session;
/// - `record_attempts` preserves batch order.
#[async_trait]
pub trait TenantStore: Send + Sync {
    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    async fn find_agent(
        &self,
        tenant_id: TenantId,
        agent_id: AgentId,
    ) -> Result<Option<Agent>, StorageError>;

    async fn find_session(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<Option<Session>, StorageError>;

    /// Messages of a session in ascending `(created_at, message_id)` order.
    async fn list_session_messages(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<Vec<Message>, StorageError>;

    // ------------------------------------------------------------------
    // Conversation writes
    // ------------------------------------------------------------------

    async fn append_message(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StorageError>;

    async fn touch_session_activity(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<(), StorageError>;

    async fn record_attempts(
        &self,
        tenant_id: TenantId,
        attempts: &[AttemptLog],
    ) -> Result<(), StorageError>;

    async fn record_usage(
        &self,
        tenant_id: TenantId,
        usage: UsageEvent,
    ) -> Result<(), StorageError>;

    // ------------------------------------------------------------------
    // Idempotency
    // ------------------------------------------------------------------

    async fn idempotency_lookup(
        &self,
        tenant_id: TenantId,
        scope: &str,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StorageError>;

    /// Guarded insert against the unique `(tenant, scope, key)` index.
    ///
    /// An existing record that was never completed and is older than
    /// `in_flight_ttl` is considered abandoned (its owner failed or died)
    /// and is replaced, returning `Inserted`; the key becomes retriable
    /// without violating the single-writer guarantee for live sends.
    async fn idempotency_insert(
        &self,
        tenant_id: TenantId,
        scope: &str,
        key: &str,
        session_id: Option<SessionId>,
        fingerprint: &str,
        in_flight_ttl: Duration,
    ) -> Result<IdempotencyInsert, StorageError>;

    /// Set the serialized response exactly once; completing an already
    /// completed record is an update failure.
    async fn idempotency_complete(
        &self,
        tenant_id: TenantId,
        scope: &str,
        key: &str,
        response: &[u8],
    ) -> Result<(), StorageError>;

    /// Drop records created before `before`. Retention only - correctness
    /// does not depend on sweeping.
    async fn sweep_idempotency(
        &self,
        tenant_id: TenantId,
        before: Timestamp,
    ) -> Result<u64, StorageError>;

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// Resolve a credential by its secret hash. Unscoped by design: this is
    /// the lookup that determines the tenant.
    async fn find_credential_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<Credential>, StorageError>;

    /// Best-effort `last_used_at` bump; callers may ignore the result.
    async fn touch_credential_last_used(
        &self,
        credential_id: CredentialId,
    ) -> Result<(), StorageError>;

    // ------------------------------------------------------------------
    // Management-plane writes (seeding, cascade)
    // ------------------------------------------------------------------

    async fn insert_tenant(&self, tenant: Tenant) -> Result<(), StorageError>;

    async fn insert_credential(&self, credential: Credential) -> Result<(), StorageError>;

    async fn insert_agent(&self, agent: Agent) -> Result<(), StorageError>;

    async fn insert_session(&self, session: Session) -> Result<(), StorageError>;

    /// Delete an agent. Sessions referencing it remain; sends against them
    /// surface agent-not-found.
    async fn remove_agent(
        &self,
        tenant_id: TenantId,
        agent_id: AgentId,
    ) -> Result<(), StorageError>;

    /// Delete a tenant and everything it owns.
    async fn remove_tenant(&self, tenant_id: TenantId) -> Result<(), StorageError>;
}
