//! Principal binding
//!
//! Turns a validated token into a [`Principal`] and publishes it to the
//! credential store under the submitted username. This store write is what
//! later authorization decisions for the connection depend on.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AuthError, Result};
use crate::store::CredentialStore;
use crate::types::{Principal, ValidatedToken};

/// Binds validated tokens to connection identities
#[derive(Debug, Clone)]
pub struct PrincipalBinder {
    store: Arc<dyn CredentialStore>,
}

impl PrincipalBinder {
    /// Create a binder writing into `store`
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// The store principals are written to
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Bind `token` to `username`
    ///
    /// When `require_username_match` is set, the token subject is the
    /// authoritative identity and must equal `username`; otherwise the
    /// attempt fails with `AuthError::IdentityMismatch` and nothing is stored.
    pub async fn bind(
        &self,
        username: &str,
        require_username_match: bool,
        token: ValidatedToken,
    ) -> Result<Principal> {
        if require_username_match && username != token.principal_name {
            debug!(
                username = %username,
                subject = %token.principal_name,
                "Username doesn't match the token subject"
            );
            return Err(AuthError::IdentityMismatch {
                username: username.to_string(),
                subject: token.principal_name,
            });
        }

        let principal = Principal::user(token);
        self.store.put(username, principal.clone()).await;

        info!(
            username = %username,
            principal = %principal,
            expires_at = %principal.token().expires_at,
            "Bound principal to connection"
        );

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use chrono::{Duration, Utc};

    fn token(subject: &str) -> ValidatedToken {
        ValidatedToken::new(subject, Utc::now() + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_matching_subject_is_stored() {
        let store = Arc::new(MemoryCredentialStore::new());
        let binder = PrincipalBinder::new(store.clone());

        let principal = binder.bind("alice", true, token("alice")).await.unwrap();

        assert_eq!(principal.name(), "alice");
        assert_eq!(store.get("alice").await.unwrap(), principal);
    }

    #[tokio::test]
    async fn test_mismatch_stores_nothing() {
        let store = Arc::new(MemoryCredentialStore::new());
        let binder = PrincipalBinder::new(store.clone());

        let result = binder.bind("bob", true, token("carol")).await;

        assert_eq!(
            result.unwrap_err(),
            AuthError::IdentityMismatch {
                username: "bob".into(),
                subject: "carol".into(),
            }
        );
        assert!(store.get("bob").await.is_none());
        assert!(store.get("carol").await.is_none());
    }

    #[tokio::test]
    async fn test_unchecked_binding_keys_by_username() {
        let store = Arc::new(MemoryCredentialStore::new());
        let binder = PrincipalBinder::new(store.clone());

        binder.bind("client1", false, token("svc-client1")).await.unwrap();

        assert_eq!(store.get("client1").await.unwrap().name(), "svc-client1");
        assert!(store.get("svc-client1").await.is_none());
    }
}
