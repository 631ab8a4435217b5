//! Identity registry: DID → credential mappings.
//!
//! Presence in the registry is the authorization predicate — `authorize`
//! never fails for a registered identity. Writes are rare (register/revoke),
//! so reads go through the shared side of a `RwLock` and are only blocked for
//! the duration of a map mutation.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::{BridgeError, BridgeResult};

#[derive(Debug, Default)]
pub struct IdentityRegistry {
    records: RwLock<HashMap<String, String>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-seeded with the well-known test identities.
    pub fn with_test_identities() -> Self {
        let mut records = HashMap::new();
        records.insert("test_did_123".to_string(), "test_oauth_456".to_string());
        records.insert("anp_user_001".to_string(), "mcp_token_001".to_string());
        Self { records: RwLock::new(records) }
    }

    /// Insert or overwrite a mapping. Returns `true` when an existing
    /// credential was replaced.
    pub async fn register(&self, did: &str, credential: &str) -> bool {
        let mut records = self.records.write().await;
        let replaced = records.insert(did.to_string(), credential.to_string()).is_some();
        tracing::info!(did = %did, replaced, "registry: identity registered");
        replaced
    }

    /// Resolve the credential for a DID, or fail with `UnknownIdentity`.
    pub async fn authorize(&self, did: &str) -> BridgeResult<String> {
        let records = self.records.read().await;
        records
            .get(did)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownIdentity(did.to_string()))
    }

    /// Remove a mapping. Idempotent — revoking an unknown DID is a no-op.
    /// Returns `true` when a mapping was actually removed.
    pub async fn revoke(&self, did: &str) -> bool {
        let removed = self.records.write().await.remove(did).is_some();
        if removed {
            tracing::info!(did = %did, "registry: identity revoked");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_authorize_returns_credential() {
        let registry = IdentityRegistry::new();
        registry.register("did:example:123", "tok-abc").await;
        assert_eq!(registry.authorize("did:example:123").await.unwrap(), "tok-abc");
    }

    #[tokio::test]
    async fn unregistered_did_is_unknown_identity() {
        let registry = IdentityRegistry::new();
        let err = registry.authorize("did:example:missing").await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownIdentity(_)));
    }

    #[tokio::test]
    async fn reregistration_overwrites() {
        let registry = IdentityRegistry::new();
        assert!(!registry.register("did:example:123", "tok-1").await);
        assert!(registry.register("did:example:123", "tok-2").await);
        assert_eq!(registry.authorize("did:example:123").await.unwrap(), "tok-2");
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let registry = IdentityRegistry::new();
        registry.register("did:example:123", "tok-abc").await;
        assert!(registry.revoke("did:example:123").await);
        assert!(!registry.revoke("did:example:123").await);
        assert!(registry.authorize("did:example:123").await.is_err());
    }

    #[tokio::test]
    async fn test_identities_are_seeded() {
        let registry = IdentityRegistry::with_test_identities();
        assert_eq!(registry.authorize("test_did_123").await.unwrap(), "test_oauth_456");
        assert_eq!(registry.authorize("anp_user_001").await.unwrap(), "mcp_token_001");
    }
}
