//! Seams to the external token collaborators
//!
//! The core never parses, fetches or verifies tokens itself. It calls a
//! [`TokenValidator`] for verification and a [`TokenAcquirer`] for the
//! client-credentials exchange.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::types::ValidatedToken;

/// Trait for token validators
///
/// Implementations check signature, issuer, expiry and claims, and resolve
/// the principal name. Any error is a terminal authentication failure.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate a bearer token
    ///
    /// # Returns
    /// * `Ok(ValidatedToken)` - The token passed every check
    /// * `Err(AuthError::Validation)` - The token was rejected
    async fn validate(&self, bearer_token: &str) -> Result<ValidatedToken>;

    /// Get a description of this validator (for logging)
    fn description(&self) -> &str {
        "token validator"
    }
}

/// Trait for clients that obtain access tokens with client credentials
///
/// Timeouts and retries belong to the implementation's transport; callers
/// treat any error as terminal.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    /// Exchange a client id and secret for an access token at `endpoint`
    async fn acquire_token(
        &self,
        endpoint: &Url,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String>;

    /// Get a description of this client (for logging)
    fn description(&self) -> &str {
        "token acquirer"
    }
}
