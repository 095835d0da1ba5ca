//! Identity and auth gate
//!
//! Resolves an opaque API credential to its tenant. Credentials are never
//! compared in plaintext - the SHA-256 hex digest of the key is the lookup
//! key, guarded by the store's unique credential-hash index.

use crate::error::GatewayError;
use std::sync::Arc;
use switchboard_core::{sha256_hex, CredentialId, TenantId};
use switchboard_store::TenantStore;

/// Hash an opaque API key the way credentials are stored.
pub fn credential_hash(api_key: &str) -> String {
    sha256_hex(&[api_key.as_bytes()])
}

/// Tenant identity injected into the per-request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub tenant_id: TenantId,
    pub credential_id: CredentialId,
}

/// Credential-to-tenant resolver.
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn TenantStore>,
}

impl AuthGate {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    /// Resolve `api_key` to its tenant or fail with `INVALID_API_KEY`.
    ///
    /// The `last_used_at` bump runs on a detached task: it must never block
    /// or fail the request.
    pub async fn authenticate(&self, api_key: &str) -> Result<AuthContext, GatewayError> {
        let hash = credential_hash(api_key);
        let credential = self
            .store
            .find_credential_by_hash(&hash)
            .await?
            .ok_or_else(|| {
                tracing::debug!("credential hash resolved to no tenant");
                GatewayError::invalid_api_key()
            })?;

        let store = Arc::clone(&self.store);
        let credential_id = credential.credential_id;
        tokio::spawn(async move {
            if let Err(error) = store.touch_credential_last_used(credential_id).await {
                tracing::warn!(%credential_id, %error, "credential last-used touch failed");
            }
        });

        Ok(AuthContext {
            tenant_id: credential.tenant_id,
            credential_id: credential.credential_id,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
