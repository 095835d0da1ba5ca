//! In-memory reference backend
//!
//! `parking_lot::RwLock`-guarded maps with the same unique indexes a SQL
//! backend would declare. Used by every test suite and small deployments;
//! a SQL backend slots in behind the same trait.

use crate::{IdempotencyInsert, TenantStore};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use switchboard_core::{
    Agent, AgentId, AttemptLog, Credential, CredentialId, EntityIdType, IdempotencyRecord, Message,
    MessageId, MessageRole, Session, SessionId, StorageError, Tenant, TenantId, Timestamp,
    UsageEvent,
};

#[derive(Default)]
struct Inner {
    tenants: HashMap<TenantId, Tenant>,
    /// Unique index: secret hash resolves to at most one credential.
    credentials_by_hash: HashMap<String, Credential>,
    agents: HashMap<(TenantId, AgentId), Agent>,
    sessions: HashMap<(TenantId, SessionId), Session>,
    messages: HashMap<(TenantId, SessionId), Vec<Message>>,
    attempts: Vec<AttemptLog>,
    usage_events: Vec<UsageEvent>,
    /// Unique index on usage `request_id`.
    usage_request_ids: HashSet<String>,
    /// Unique index: `(tenant, scope, key)`.
    idempotency: HashMap<(TenantId, String, String), IdempotencyRecord>,
    /// High-water mark for per-session monotonic message timestamps.
    last_message_at: HashMap<(TenantId, SessionId), Timestamp>,
}

/// In-memory `TenantStore` backend. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Inspection helpers (not part of the store contract; used by tests
    // and by the management plane's rollup queries)
    // ------------------------------------------------------------------

    pub fn usage_events(&self, tenant_id: TenantId) -> Vec<UsageEvent> {
        self.inner
            .read()
            .usage_events
            .iter()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn attempt_logs(&self, tenant_id: TenantId, session_id: SessionId) -> Vec<AttemptLog> {
        self.inner
            .read()
            .attempts
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn message_count(&self, tenant_id: TenantId, session_id: SessionId) -> usize {
        self.inner
            .read()
            .messages
            .get(&(tenant_id, session_id))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn idempotency_record(
        &self,
        tenant_id: TenantId,
        scope: &str,
        key: &str,
    ) -> Option<IdempotencyRecord> {
        self.inner
            .read()
            .idempotency
            .get(&(tenant_id, scope.to_string(), key.to_string()))
            .cloned()
    }

    pub fn credential_last_used(&self, secret_hash: &str) -> Option<Timestamp> {
        self.inner
            .read()
            .credentials_by_hash
            .get(secret_hash)
            .and_then(|c| c.last_used_at)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn find_agent(
        &self,
        tenant_id: TenantId,
        agent_id: AgentId,
    ) -> Result<Option<Agent>, StorageError> {
        Ok(self.inner.read().agents.get(&(tenant_id, agent_id)).cloned())
    }

    async fn find_session(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<Option<Session>, StorageError> {
        Ok(self.inner.read().sessions.get(&(tenant_id, session_id)).cloned())
    }

    async fn list_session_messages(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<Vec<Message>, StorageError> {
        let mut messages = self
            .inner
            .read()
            .messages
            .get(&(tenant_id, session_id))
            .cloned()
            .unwrap_or_default();
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.message_id.cmp(&b.message_id))
        });
        Ok(messages)
    }

    async fn append_message(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StorageError> {
        let mut inner = self.inner.write();
        if !inner.sessions.contains_key(&(tenant_id, session_id)) {
            return Err(StorageError::not_found("session", session_id));
        }

        // Monotonic within the session: never at or before the previous row.
        let mut created_at = Utc::now();
        if let Some(last) = inner.last_message_at.get(&(tenant_id, session_id)) {
            if created_at <= *last {
                created_at = *last + Duration::milliseconds(1);
            }
        }
        inner.last_message_at.insert((tenant_id, session_id), created_at);

        let message = Message {
            message_id: MessageId::now_v7(),
            tenant_id,
            session_id,
            role,
            content: content.to_string(),
            created_at,
        };
        inner
            .messages
            .entry((tenant_id, session_id))
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn touch_session_activity(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        match inner.sessions.get_mut(&(tenant_id, session_id)) {
            Some(session) => {
                session.last_activity_at = Utc::now();
                Ok(())
            }
            None => Err(StorageError::not_found("session", session_id)),
        }
    }

    async fn record_attempts(
        &self,
        tenant_id: TenantId,
        attempts: &[AttemptLog],
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        for attempt in attempts {
            if attempt.tenant_id != tenant_id {
                return Err(StorageError::InsertFailed {
                    entity: "attempt_log",
                    reason: "attempt row carries a foreign tenant".to_string(),
                });
            }
            inner.attempts.push(attempt.clone());
        }
        Ok(())
    }

    async fn record_usage(
        &self,
        tenant_id: TenantId,
        usage: UsageEvent,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if usage.tenant_id != tenant_id {
            return Err(StorageError::InsertFailed {
                entity: "usage_event",
                reason: "usage row carries a foreign tenant".to_string(),
            });
        }
        if !inner.usage_request_ids.insert(usage.request_id.clone()) {
            return Err(StorageError::conflict("usage_request_id", &usage.request_id));
        }
        inner.usage_events.push(usage);
        Ok(())
    }

    async fn idempotency_lookup(
        &self,
        tenant_id: TenantId,
        scope: &str,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StorageError> {
        Ok(self
            .inner
            .read()
            .idempotency
            .get(&(tenant_id, scope.to_string(), key.to_string()))
            .cloned())
    }

    async fn idempotency_insert(
        &self,
        tenant_id: TenantId,
        scope: &str,
        key: &str,
        session_id: Option<SessionId>,
        fingerprint: &str,
        in_flight_ttl: std::time::Duration,
    ) -> Result<IdempotencyInsert, StorageError> {
        let mut inner = self.inner.write();
        let index_key = (tenant_id, scope.to_string(), key.to_string());
        if let Some(existing) = inner.idempotency.get(&index_key) {
            let ttl = Duration::from_std(in_flight_ttl).unwrap_or(Duration::MAX);
            let abandoned = existing.response.is_none() && Utc::now() - existing.created_at >= ttl;
            if !abandoned {
                return Ok(IdempotencyInsert::Existing(existing.clone()));
            }
            tracing::debug!(%tenant_id, key, "taking over abandoned idempotency placeholder");
        }
        let record = IdempotencyRecord::pending(tenant_id, scope, key, session_id, fingerprint);
        inner.idempotency.insert(index_key, record.clone());
        Ok(IdempotencyInsert::Inserted(record))
    }

    async fn idempotency_complete(
        &self,
        tenant_id: TenantId,
        scope: &str,
        key: &str,
        response: &[u8],
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let index_key = (tenant_id, scope.to_string(), key.to_string());
        match inner.idempotency.get_mut(&index_key) {
            Some(record) => {
                if record.response.is_some() {
                    return Err(StorageError::UpdateFailed {
                        entity: "idempotency_record",
                        id: key.to_string(),
                        reason: "response already set".to_string(),
                    });
                }
                record.response = Some(response.to_vec());
                Ok(())
            }
            None => Err(StorageError::not_found("idempotency_record", key)),
        }
    }

    async fn sweep_idempotency(
        &self,
        tenant_id: TenantId,
        before: Timestamp,
    ) -> Result<u64, StorageError> {
        let mut inner = self.inner.write();
        let before_len = inner.idempotency.len();
        inner
            .idempotency
            .retain(|(tenant, _, _), record| *tenant != tenant_id || record.created_at >= before);
        Ok((before_len - inner.idempotency.len()) as u64)
    }

    async fn find_credential_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<Credential>, StorageError> {
        Ok(self.inner.read().credentials_by_hash.get(secret_hash).cloned())
    }

    async fn touch_credential_last_used(
        &self,
        credential_id: CredentialId,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let credential = inner
            .credentials_by_hash
            .values_mut()
            .find(|c| c.credential_id == credential_id);
        match credential {
            Some(credential) => {
                credential.last_used_at = Some(Utc::now());
                Ok(())
            }
            None => Err(StorageError::not_found("credential", credential_id)),
        }
    }

    async fn insert_tenant(&self, tenant: Tenant) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if inner.tenants.contains_key(&tenant.tenant_id) {
            return Err(StorageError::conflict("tenant_id", tenant.tenant_id));
        }
        inner.tenants.insert(tenant.tenant_id, tenant);
        Ok(())
    }

    async fn insert_credential(&self, credential: Credential) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if inner.credentials_by_hash.contains_key(&credential.secret_hash) {
            return Err(StorageError::conflict("credential_hash", &credential.secret_hash));
        }
        inner
            .credentials_by_hash
            .insert(credential.secret_hash.clone(), credential);
        Ok(())
    }

    async fn insert_agent(&self, agent: Agent) -> Result<(), StorageError> {
        if !agent.fallback_is_valid() {
            return Err(StorageError::InsertFailed {
                entity: "agent",
                reason: "fallback vendor equals primary vendor".to_string(),
            });
        }
        let mut inner = self.inner.write();
        inner.agents.insert((agent.tenant_id, agent.agent_id), agent);
        Ok(())
    }

    async fn insert_session(&self, session: Session) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        // Sessions may only reference agents of their own tenant.
        if !inner
            .agents
            .contains_key(&(session.tenant_id, session.agent_id))
        {
            return Err(StorageError::InsertFailed {
                entity: "session",
                reason: "agent does not exist in this tenant".to_string(),
            });
        }
        inner
            .sessions
            .insert((session.tenant_id, session.session_id), session);
        Ok(())
    }

    async fn remove_agent(
        &self,
        tenant_id: TenantId,
        agent_id: AgentId,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        match inner.agents.remove(&(tenant_id, agent_id)) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found("agent", agent_id)),
        }
    }

    async fn remove_tenant(&self, tenant_id: TenantId) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if inner.tenants.remove(&tenant_id).is_none() {
            return Err(StorageError::not_found("tenant", tenant_id));
        }
        inner.credentials_by_hash.retain(|_, c| c.tenant_id != tenant_id);
        inner.agents.retain(|(tenant, _), _| *tenant != tenant_id);
        inner.sessions.retain(|(tenant, _), _| *tenant != tenant_id);
        inner.messages.retain(|(tenant, _), _| *tenant != tenant_id);
        inner.last_message_at.retain(|(tenant, _), _| *tenant != tenant_id);
        inner.attempts.retain(|a| a.tenant_id != tenant_id);
        let removed_usage: Vec<String> = inner
            .usage_events
            .iter()
            .filter(|u| u.tenant_id == tenant_id)
            .map(|u| u.request_id.clone())
            .collect();
        for request_id in removed_usage {
            inner.usage_request_ids.remove(&request_id);
        }
        inner.usage_events.retain(|u| u.tenant_id != tenant_id);
        inner.idempotency.retain(|(tenant, _, _), _| *tenant != tenant_id);
        tracing::debug!(%tenant_id, "tenant removed with full cascade");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::Vendor;

    async fn seeded() -> (MemoryStore, TenantId, AgentId, SessionId) {
        let store = MemoryStore::new();
        let tenant = Tenant::new("acme");
        let tenant_id = tenant.tenant_id;
        store.insert_tenant(tenant).await.unwrap();

        let agent = Agent::new(tenant_id, "support", Vendor::VendorA, None, "be helpful");
        let agent_id = agent.agent_id;
        store.insert_agent(agent).await.unwrap();

        let session = Session::new(tenant_id, agent_id, "customer-1");
        let session_id = session.session_id;
        store.insert_session(session).await.unwrap();

        (store, tenant_id, agent_id, session_id)
    }

    #[tokio::test]
    async fn test_reads_are_tenant_scoped() {
        let (store, tenant_id, agent_id, session_id) = seeded().await;
        let stranger = TenantId::now_v7();

        assert!(store.find_agent(tenant_id, agent_id).await.unwrap().is_some());
        assert!(store.find_agent(stranger, agent_id).await.unwrap().is_none());
        assert!(store.find_session(stranger, session_id).await.unwrap().is_none());
        assert!(store
            .list_session_messages(stranger, session_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_append_message_is_monotonic() {
        let (store, tenant_id, _, session_id) = seeded().await;

        for i in 0..10 {
            store
                .append_message(tenant_id, session_id, MessageRole::User, &format!("m{i}"))
                .await
                .unwrap();
        }

        let messages = store.list_session_messages(tenant_id, session_id).await.unwrap();
        assert_eq!(messages.len(), 10);
        for pair in messages.windows(2) {
            assert!(pair[0].created_at < pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn test_append_message_rejects_unknown_session() {
        let (store, tenant_id, _, _) = seeded().await;
        let err = store
            .append_message(tenant_id, SessionId::now_v7(), MessageRole::User, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    const TTL: std::time::Duration = std::time::Duration::from_secs(120);

    #[tokio::test]
    async fn test_idempotency_unique_index() {
        let (store, tenant_id, _, session_id) = seeded().await;

        let first = store
            .idempotency_insert(tenant_id, "send_message", "k1", Some(session_id), "fp1", TTL)
            .await
            .unwrap();
        assert!(matches!(first, IdempotencyInsert::Inserted(_)));

        let second = store
            .idempotency_insert(tenant_id, "send_message", "k1", Some(session_id), "fp2", TTL)
            .await
            .unwrap();
        match second {
            IdempotencyInsert::Existing(record) => assert_eq!(record.request_fingerprint, "fp1"),
            IdempotencyInsert::Inserted(_) => panic!("duplicate key must not insert"),
        }

        // Same key under another tenant is a different row.
        let other_tenant = TenantId::now_v7();
        let other = store
            .idempotency_insert(other_tenant, "send_message", "k1", None, "fp3", TTL)
            .await
            .unwrap();
        assert!(matches!(other, IdempotencyInsert::Inserted(_)));
    }

    #[tokio::test]
    async fn test_abandoned_placeholder_is_taken_over() {
        let (store, tenant_id, _, session_id) = seeded().await;
        store
            .idempotency_insert(tenant_id, "send_message", "k1", Some(session_id), "fp1", TTL)
            .await
            .unwrap();

        // Zero TTL makes the never-completed row immediately reclaimable.
        let retaken = store
            .idempotency_insert(
                tenant_id,
                "send_message",
                "k1",
                Some(session_id),
                "fp2",
                std::time::Duration::ZERO,
            )
            .await
            .unwrap();
        match retaken {
            IdempotencyInsert::Inserted(record) => assert_eq!(record.request_fingerprint, "fp2"),
            IdempotencyInsert::Existing(_) => panic!("abandoned placeholder must be replaced"),
        }

        // A completed record is never reclaimed, whatever its age.
        store
            .idempotency_complete(tenant_id, "send_message", "k1", b"{}")
            .await
            .unwrap();
        let completed = store
            .idempotency_insert(
                tenant_id,
                "send_message",
                "k1",
                Some(session_id),
                "fp3",
                std::time::Duration::ZERO,
            )
            .await
            .unwrap();
        assert!(matches!(completed, IdempotencyInsert::Existing(_)));
    }

    #[tokio::test]
    async fn test_idempotency_complete_sets_once() {
        let (store, tenant_id, _, session_id) = seeded().await;
        store
            .idempotency_insert(tenant_id, "send_message", "k1", Some(session_id), "fp", TTL)
            .await
            .unwrap();

        store
            .idempotency_complete(tenant_id, "send_message", "k1", b"{\"ok\":true}")
            .await
            .unwrap();

        let err = store
            .idempotency_complete(tenant_id, "send_message", "k1", b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UpdateFailed { .. }));

        let record = store
            .idempotency_lookup(tenant_id, "send_message", "k1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.response.as_deref(), Some(b"{\"ok\":true}".as_slice()));
    }

    #[tokio::test]
    async fn test_usage_request_id_is_unique() {
        let (store, tenant_id, agent_id, session_id) = seeded().await;

        let usage = UsageEvent::new(
            tenant_id, session_id, agent_id, Vendor::VendorA, 10, 20, 0.0006, "req-1",
        );
        store.record_usage(tenant_id, usage.clone()).await.unwrap();

        let duplicate = UsageEvent::new(
            tenant_id, session_id, agent_id, Vendor::VendorA, 10, 20, 0.0006, "req-1",
        );
        let err = store.record_usage(tenant_id, duplicate).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert_eq!(store.usage_events(tenant_id).len(), 1);
    }

    #[tokio::test]
    async fn test_credential_hash_unique_and_touch() {
        let (store, tenant_id, _, _) = seeded().await;
        let credential = Credential::new(tenant_id, "hash-1");
        let credential_id = credential.credential_id;
        store.insert_credential(credential).await.unwrap();

        let duplicate = Credential::new(tenant_id, "hash-1");
        assert!(store.insert_credential(duplicate).await.is_err());

        assert!(store.credential_last_used("hash-1").is_none());
        store.touch_credential_last_used(credential_id).await.unwrap();
        assert!(store.credential_last_used("hash-1").is_some());
    }

    #[tokio::test]
    async fn test_sweep_idempotency_by_age() {
        let (store, tenant_id, _, session_id) = seeded().await;
        store
            .idempotency_insert(tenant_id, "send_message", "old", Some(session_id), "fp", TTL)
            .await
            .unwrap();

        let removed = store
            .sweep_idempotency(tenant_id, Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .idempotency_lookup(tenant_id, "send_message", "old")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_remove_tenant_cascades() {
        let (store, tenant_id, agent_id, session_id) = seeded().await;
        store
            .append_message(tenant_id, session_id, MessageRole::User, "hi")
            .await
            .unwrap();
        store
            .record_usage(
                tenant_id,
                UsageEvent::new(
                    tenant_id, session_id, agent_id, Vendor::VendorA, 1, 1, 0.0, "req-x",
                ),
            )
            .await
            .unwrap();
        store
            .idempotency_insert(tenant_id, "send_message", "k", Some(session_id), "fp", TTL)
            .await
            .unwrap();

        store.remove_tenant(tenant_id).await.unwrap();

        assert!(store.find_agent(tenant_id, agent_id).await.unwrap().is_none());
        assert!(store.find_session(tenant_id, session_id).await.unwrap().is_none());
        assert_eq!(store.message_count(tenant_id, session_id), 0);
        assert!(store.usage_events(tenant_id).is_empty());
        assert!(store
            .idempotency_lookup(tenant_id, "send_message", "k")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_session_requires_same_tenant_agent() {
        let (store, _, agent_id, _) = seeded().await;
        let other_tenant = Tenant::new("other");
        let other_tenant_id = other_tenant.tenant_id;
        store.insert_tenant(other_tenant).await.unwrap();

        // Session in other tenant referencing the first tenant's agent.
        let session = Session::new(other_tenant_id, agent_id, "customer");
        assert!(store.insert_session(session).await.is_err());
    }
}
