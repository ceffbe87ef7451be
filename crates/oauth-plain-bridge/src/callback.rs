//! SASL/PLAIN callback adapter
//!
//! Receives the callbacks a SASL/PLAIN server hands out for one exchange,
//! runs the OAuth over PLAIN pipeline, and reports the outcome through the
//! callbacks. All failures leave through one path that logs once and returns
//! a generic error carrying an error id for correlation.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use oauth_plain_core::{
    AuthError, AuthErrorKind, Authenticator, CredentialResolver, CredentialStore, Principal,
    PrincipalBinder, TokenAcquirer, TokenValidator,
};

use crate::config::{ConfigError, ServerPlainConfig, OAUTH_JWKS_ENDPOINT_URI};
use crate::handlers::{ClientCredentialsClient, JwtValidator};

/// The only SASL mechanism this adapter serves
pub const PLAIN_MECHANISM: &str = "PLAIN";

/// Carries the authentication id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCallback {
    prompt: String,
    default_name: Option<String>,
}

impl NameCallback {
    pub fn new(prompt: impl Into<String>, default_name: Option<String>) -> Self {
        Self {
            prompt: prompt.into(),
            default_name,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }
}

/// Carries the password and receives the verdict
#[derive(Clone, PartialEq, Eq)]
pub struct PlainAuthenticateCallback {
    password: String,
    authenticated: bool,
}

impl PlainAuthenticateCallback {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            authenticated: false,
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }
}

impl std::fmt::Debug for PlainAuthenticateCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainAuthenticateCallback")
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

/// Callbacks a SASL server may pass to the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Name(NameCallback),
    PlainAuthenticate(PlainAuthenticateCallback),
    /// Any callback kind this handler does not understand
    Unsupported(String),
}

/// Authentication failure reported to the SASL peer
///
/// `Display` is generic; the kind and detail stay local.
#[derive(Error, Debug, Clone)]
#[error("Authentication failed (ErrId: {error_id})")]
pub struct SaslAuthenticationError {
    error_id: String,
    kind: AuthErrorKind,
    detail: String,
}

impl SaslAuthenticationError {
    fn new(err: &AuthError) -> Self {
        let mut error_id = Uuid::new_v4().simple().to_string();
        error_id.truncate(8);
        Self {
            error_id,
            kind: err.kind(),
            detail: err.to_string(),
        }
    }

    /// Id logged alongside the detail
    pub fn error_id(&self) -> &str {
        &self.error_id
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    /// Internal detail, for local use only
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Fields gathered from the callbacks before dispatching
#[derive(Default)]
struct Collected<'a> {
    username: Option<String>,
    password: Option<&'a mut PlainAuthenticateCallback>,
}

impl<'a> Collected<'a> {
    fn collect(callbacks: &'a mut [Callback]) -> Result<Self, AuthError> {
        let mut collected = Collected::default();
        for callback in callbacks {
            match callback {
                Callback::Name(name) => collected.username = name.default_name.clone(),
                Callback::PlainAuthenticate(cb) => collected.password = Some(cb),
                Callback::Unsupported(kind) => {
                    return Err(AuthError::Configuration(format!(
                        "unsupported callback: {}",
                        kind
                    )))
                }
            }
        }
        Ok(collected)
    }
}

/// Callback handler implementing OAuth over PLAIN
///
/// Holds the pipeline by composition; build it once per listener with
/// [`configure`](Self::configure) before any exchange is handled.
#[derive(Clone)]
pub struct OAuthOverPlainCallbackHandler {
    authenticator: Authenticator,
}

impl OAuthOverPlainCallbackHandler {
    /// Configure the handler from listener configuration
    ///
    /// Builds the JWT validator and, when a token endpoint is set, the
    /// client-credentials client.
    pub fn configure(
        mechanism: &str,
        config: &ServerPlainConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ConfigError> {
        let jwt = config
            .jwt
            .clone()
            .ok_or(ConfigError::Missing(OAUTH_JWKS_ENDPOINT_URI))?;
        let validator = Arc::new(JwtValidator::new(jwt, &config.transport)?);
        let acquirer = Arc::new(ClientCredentialsClient::new(
            &config.transport,
            config.client_credentials.clone(),
        )?);

        Self::configure_with(mechanism, config, validator, acquirer, store)
    }

    /// Configure the handler with injected collaborators
    pub fn configure_with(
        mechanism: &str,
        config: &ServerPlainConfig,
        validator: Arc<dyn TokenValidator>,
        acquirer: Arc<dyn TokenAcquirer>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ConfigError> {
        if mechanism != PLAIN_MECHANISM {
            return Err(ConfigError::UnsupportedMechanism(mechanism.to_string()));
        }

        let mut resolver = CredentialResolver::new();
        match &config.token_endpoint_uri {
            Some(endpoint) => {
                debug!(
                    token_endpoint = %endpoint,
                    validator = validator.description(),
                    "Configured OAuth over PLAIN"
                );
                resolver = resolver.with_client_credentials(endpoint.clone(), acquirer);
            }
            None => {
                debug!(
                    validator = validator.description(),
                    "Configured OAuth over PLAIN without token endpoint - client credentials \
                     unavailable, passwords are treated as access tokens"
                );
            }
        }

        Ok(Self {
            authenticator: Authenticator::new(resolver, validator, PrincipalBinder::new(store)),
        })
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Handle the callbacks of one SASL/PLAIN exchange
    ///
    /// On success the `PlainAuthenticateCallback` is marked authenticated and
    /// the bound principal returned.
    pub async fn handle(
        &self,
        callbacks: &mut [Callback],
    ) -> Result<Principal, SaslAuthenticationError> {
        let mut username = None;
        let result = match Collected::collect(callbacks) {
            Ok(collected) => {
                username = collected.username.clone();
                self.dispatch(collected).await
            }
            Err(e) => Err(e),
        };

        result.map_err(|e| report_failure(username.as_deref(), &e))
    }

    async fn dispatch(&self, collected: Collected<'_>) -> Result<Principal, AuthError> {
        let callback = collected.password.ok_or_else(|| {
            AuthError::Configuration("no PlainAuthenticateCallback provided".into())
        })?;
        let username = collected
            .username
            .ok_or_else(|| AuthError::Configuration("username not provided".into()))?;

        let principal = self
            .authenticator
            .authenticate(Some(&username), Some(callback.password()))
            .await?;

        callback.set_authenticated(true);
        Ok(principal)
    }
}

/// Log a failure once and convert it to the peer-facing error
fn report_failure(username: Option<&str>, err: &AuthError) -> SaslAuthenticationError {
    let error = SaslAuthenticationError::new(err);
    warn!(
        error_id = %error.error_id(),
        kind = %error.kind(),
        username = ?username,
        detail = %error.detail(),
        "Authentication failed"
    );
    error
}
