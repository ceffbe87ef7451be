//! Credential flow resolution
//!
//! Decides what the SASL/PLAIN password represents and turns it into a
//! bearer token to validate. Three interpretations share the same two string
//! fields, checked in strict priority order:
//!
//! 1. `$accessToken:<token>` - an explicitly marked access token
//! 2. any other password, when no token endpoint is configured - a raw token
//! 3. otherwise - a client secret for a client-credentials exchange, with the
//!    username as the client id
//!
//! Paths 1 and 2 require the token subject to equal the username. Path 3 does
//! not: a service account's subject may legitimately differ from its client id.

use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::error::{AuthError, Result};
use crate::gateway::TokenAcquirer;
use crate::types::{ResolvedTokenRequest, TokenSourceKind};

/// Marker that flags the password as an access token
///
/// Case-sensitive. Takes precedence over any endpoint configuration.
pub const ACCESS_TOKEN_PREFIX: &str = "$accessToken:";

/// Classified interpretation of a submitted password
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TokenSource<'a> {
    /// Token following the `$accessToken:` marker
    Prefixed(&'a str),
    /// Password used verbatim as a token
    BarePassword(&'a str),
    /// Client id and secret for a token endpoint exchange
    ClientCredentials {
        client_id: &'a str,
        client_secret: Option<&'a str>,
    },
}

impl TokenSource<'_> {
    pub fn kind(&self) -> TokenSourceKind {
        match self {
            TokenSource::Prefixed(_) => TokenSourceKind::Prefixed,
            TokenSource::BarePassword(_) => TokenSourceKind::BarePassword,
            TokenSource::ClientCredentials { .. } => TokenSourceKind::ClientCredentials,
        }
    }

    /// Whether the validated subject must equal the submitted username
    pub fn require_username_match(&self) -> bool {
        !matches!(self, TokenSource::ClientCredentials { .. })
    }
}

impl std::fmt::Debug for TokenSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Prefixed(_) => f.write_str("Prefixed(<redacted>)"),
            TokenSource::BarePassword(_) => f.write_str("BarePassword(<redacted>)"),
            TokenSource::ClientCredentials {
                client_id,
                client_secret,
            } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret_set", &client_secret.is_some())
                .finish(),
        }
    }
}

/// Classify a password
///
/// Pure function of its inputs; performs no I/O and never rejects a token.
pub fn classify<'a>(
    username: &'a str,
    password: Option<&'a str>,
    token_endpoint_configured: bool,
) -> TokenSource<'a> {
    match password {
        Some(password) if password.starts_with(ACCESS_TOKEN_PREFIX) => {
            TokenSource::Prefixed(&password[ACCESS_TOKEN_PREFIX.len()..])
        }
        Some(password) if !token_endpoint_configured => TokenSource::BarePassword(password),
        _ => TokenSource::ClientCredentials {
            client_id: username,
            client_secret: password,
        },
    }
}

/// Resolves a credential submission into a [`ResolvedTokenRequest`]
///
/// Performs the client-credentials exchange when the classification asks for
/// one. The exchange is attempted once; a failure ends the attempt.
#[derive(Clone, Default)]
pub struct CredentialResolver {
    token_endpoint: Option<Url>,
    acquirer: Option<Arc<dyn TokenAcquirer>>,
}

impl CredentialResolver {
    /// Create a resolver without a token endpoint
    ///
    /// Plain passwords are then always treated as access tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable client-credentials mode against `endpoint`
    pub fn with_client_credentials(
        mut self,
        endpoint: Url,
        acquirer: Arc<dyn TokenAcquirer>,
    ) -> Self {
        self.token_endpoint = Some(endpoint);
        self.acquirer = Some(acquirer);
        self
    }

    pub fn token_endpoint(&self) -> Option<&Url> {
        self.token_endpoint.as_ref()
    }

    pub fn token_endpoint_configured(&self) -> bool {
        self.token_endpoint.is_some()
    }

    /// Resolve a submission into a bearer token to validate
    ///
    /// # Errors
    /// * `AuthError::Configuration` - username absent, or a client-credentials
    ///   exchange is needed without an endpoint or without a secret
    /// * `AuthError::Transport` (or whatever the acquirer returns) - the
    ///   exchange failed
    pub async fn resolve(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<ResolvedTokenRequest> {
        let username = username
            .ok_or_else(|| AuthError::Configuration("username not provided".into()))?;

        let source = classify(username, password, self.token_endpoint_configured());
        debug!(username = %username, source = %source.kind(), "Classified PLAIN credentials");

        let bearer_token = match source {
            TokenSource::Prefixed(token) | TokenSource::BarePassword(token) => token.to_string(),
            TokenSource::ClientCredentials {
                client_id,
                client_secret,
            } => {
                let (endpoint, acquirer) = match (&self.token_endpoint, &self.acquirer) {
                    (Some(endpoint), Some(acquirer)) => (endpoint, acquirer),
                    _ => {
                        return Err(AuthError::Configuration(
                            "client credentials require a configured token endpoint".into(),
                        ))
                    }
                };
                let client_secret = client_secret.ok_or_else(|| {
                    AuthError::Configuration("client secret not provided".into())
                })?;

                debug!(
                    client_id = %client_id,
                    endpoint = %endpoint,
                    acquirer = acquirer.description(),
                    "Obtaining access token with client credentials"
                );
                acquirer
                    .acquire_token(endpoint, client_id, client_secret)
                    .await?
            }
        };

        Ok(ResolvedTokenRequest {
            bearer_token,
            require_username_match: source.require_username_match(),
            source: source.kind(),
        })
    }
}
