//! Authentication pipeline: resolve, validate, bind

use std::sync::Arc;
use tracing::{debug, info};

use crate::binder::PrincipalBinder;
use crate::error::{AuthError, Result};
use crate::gateway::TokenValidator;
use crate::resolver::CredentialResolver;
use crate::store::CredentialStore;
use crate::types::{CredentialSubmission, Principal};

/// Authenticates PLAIN credentials against an OAuth identity provider
///
/// Every successful attempt ends with a principal built from a token that
/// passed the validator, stored under the submitted username.
#[derive(Clone)]
pub struct Authenticator {
    resolver: CredentialResolver,
    validator: Arc<dyn TokenValidator>,
    binder: PrincipalBinder,
}

impl Authenticator {
    pub fn new(
        resolver: CredentialResolver,
        validator: Arc<dyn TokenValidator>,
        binder: PrincipalBinder,
    ) -> Self {
        Self {
            resolver,
            validator,
            binder,
        }
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// The store bound principals are written to
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        self.binder.store()
    }

    /// Authenticate a username/password pair
    ///
    /// # Errors
    /// * `AuthError::Configuration` - username absent or client-credentials
    ///   mode unavailable
    /// * `AuthError::Transport` - the client-credentials exchange failed
    /// * `AuthError::Validation` - the validator rejected the token
    /// * `AuthError::IdentityMismatch` - token subject differs from username
    pub async fn authenticate(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Principal> {
        let username = username
            .ok_or_else(|| AuthError::Configuration("username not provided".into()))?;
        let resolved = self.resolver.resolve(Some(username), password).await?;

        let token = match self.validator.validate(&resolved.bearer_token).await {
            Ok(token) => token,
            Err(e) => {
                debug!(
                    username = %username,
                    source = %resolved.source,
                    validator = self.validator.description(),
                    error = %e,
                    "Access token rejected"
                );
                return Err(e);
            }
        };

        let principal = self
            .binder
            .bind(username, resolved.require_username_match, token)
            .await?;

        info!(
            username = %username,
            source = %resolved.source,
            principal = %principal,
            "Authenticated over PLAIN"
        );

        Ok(principal)
    }

    /// Authenticate a [`CredentialSubmission`]
    pub async fn authenticate_submission(
        &self,
        submission: &CredentialSubmission,
    ) -> Result<Principal> {
        self.authenticate(submission.username.as_deref(), submission.password.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TokenAcquirer;
    use crate::store::MemoryCredentialStore;
    use crate::types::ValidatedToken;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Validator accepting tokens from a fixed table
    struct TableValidator {
        subjects: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl TableValidator {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                subjects: entries
                    .iter()
                    .map(|(t, s)| (t.to_string(), s.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenValidator for TableValidator {
        async fn validate(&self, bearer_token: &str) -> Result<ValidatedToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.subjects
                .get(bearer_token)
                .map(|subject| ValidatedToken::new(subject, Utc::now() + Duration::hours(1)))
                .ok_or_else(|| AuthError::Validation("unknown token".into()))
        }
    }

    struct FixedAcquirer(&'static str);

    #[async_trait]
    impl TokenAcquirer for FixedAcquirer {
        async fn acquire_token(&self, _: &Url, _: &str, _: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingAcquirer;

    #[async_trait]
    impl TokenAcquirer for FailingAcquirer {
        async fn acquire_token(&self, _: &Url, _: &str, _: &str) -> Result<String> {
            Err(AuthError::Transport("connection refused".into()))
        }
    }

    fn authenticator(
        resolver: CredentialResolver,
        validator: Arc<TableValidator>,
    ) -> (Authenticator, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let binder = PrincipalBinder::new(store.clone());
        (Authenticator::new(resolver, validator, binder), store)
    }

    #[tokio::test]
    async fn test_prefixed_token_success() {
        let validator = Arc::new(TableValidator::new(&[("abc123", "alice")]));
        let (auth, store) = authenticator(CredentialResolver::new(), validator);

        let principal = auth
            .authenticate(Some("alice"), Some("$accessToken:abc123"))
            .await
            .unwrap();

        assert_eq!(principal.name(), "alice");
        assert_eq!(store.get("alice").await.unwrap().name(), "alice");
    }

    #[tokio::test]
    async fn test_transport_failure_skips_validation() {
        let validator = Arc::new(TableValidator::new(&[]));
        let resolver = CredentialResolver::new().with_client_credentials(
            Url::parse("https://idp/token").unwrap(),
            Arc::new(FailingAcquirer),
        );
        let (auth, store) = authenticator(resolver, validator.clone());

        let result = auth.authenticate(Some("client1"), Some("secretXYZ")).await;

        assert!(matches!(result, Err(AuthError::Transport(_))));
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_client_credentials_token_is_validated() {
        let validator = Arc::new(TableValidator::new(&[("cc-token", "svc-client1")]));
        let resolver = CredentialResolver::new().with_client_credentials(
            Url::parse("https://idp/token").unwrap(),
            Arc::new(FixedAcquirer("cc-token")),
        );
        let (auth, store) = authenticator(resolver, validator);

        let submission = CredentialSubmission::new("client1", "secretXYZ");
        let principal = auth.authenticate_submission(&submission).await.unwrap();

        assert_eq!(principal.name(), "svc-client1");
        assert_eq!(store.get("client1").await.unwrap().name(), "svc-client1");
    }

    #[tokio::test]
    async fn test_missing_username_rejected_before_exchange() {
        let validator = Arc::new(TableValidator::new(&[("abc123", "alice")]));
        let resolver = CredentialResolver::new().with_client_credentials(
            Url::parse("https://idp/token").unwrap(),
            Arc::new(FailingAcquirer),
        );
        let (auth, store) = authenticator(resolver, validator.clone());

        for password in [Some("secretXYZ"), Some("$accessToken:abc123"), None] {
            let result = auth.authenticate(None, password).await;
            assert!(matches!(result, Err(AuthError::Configuration(_))));
        }

        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await, 0);
    }
}
