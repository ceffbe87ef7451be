//! Core types for OAuth over PLAIN authentication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw username/password pair as received from a connecting peer
///
/// Lives for one authentication attempt only.
#[derive(Clone, Default)]
pub struct CredentialSubmission {
    /// SASL/PLAIN authentication id
    pub username: Option<String>,
    /// SASL/PLAIN password, which may carry a token or a client secret
    pub password: Option<String>,
}

impl CredentialSubmission {
    /// Create a submission with both fields present
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }
}

impl std::fmt::Debug for CredentialSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSubmission")
            .field("username", &self.username)
            .field("password_set", &self.password.is_some())
            .finish()
    }
}

/// Which interpretation of the password produced the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSourceKind {
    /// Password carried the `$accessToken:` marker
    Prefixed,
    /// Password used verbatim as the token (no token endpoint configured)
    BarePassword,
    /// Token obtained through a client-credentials exchange
    ClientCredentials,
}

impl std::fmt::Display for TokenSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSourceKind::Prefixed => write!(f, "prefixed"),
            TokenSourceKind::BarePassword => write!(f, "bare_password"),
            TokenSourceKind::ClientCredentials => write!(f, "client_credentials"),
        }
    }
}

/// Bearer token to validate, plus whether its subject must equal the username
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedTokenRequest {
    /// Access token handed to the validator
    pub bearer_token: String,
    /// When true the validated subject must equal the submitted username
    pub require_username_match: bool,
    /// Path that produced the token
    pub source: TokenSourceKind,
}

impl std::fmt::Debug for ResolvedTokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedTokenRequest")
            .field("bearer_token", &"<redacted>")
            .field("require_username_match", &self.require_username_match)
            .field("source", &self.source)
            .finish()
    }
}

/// A token that passed external validation
///
/// Produced by a [`TokenValidator`](crate::TokenValidator); the core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedToken {
    /// Principal name resolved from the token (e.g. the `sub` claim)
    pub principal_name: String,

    /// When the token expires
    pub expires_at: DateTime<Utc>,

    /// When the token was issued (if known)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,

    /// Scopes granted by the token
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Raw claims, opaque to the core
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ValidatedToken {
    /// Create a new validated token
    pub fn new(principal_name: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            principal_name: principal_name.into(),
            expires_at,
            issued_at: None,
            scopes: Vec::new(),
            payload: serde_json::Value::Null,
        }
    }

    /// Set issued-at time
    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    /// Set scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the raw claims payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Types of principals bound to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalType {
    User,
}

impl std::fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrincipalType::User => write!(f, "User"),
        }
    }
}

/// Verified identity bound to a connection
///
/// Only the [`PrincipalBinder`](crate::PrincipalBinder) constructs these, and
/// only from a [`ValidatedToken`].
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    principal_type: PrincipalType,
    name: String,
    token: Arc<ValidatedToken>,
}

impl Principal {
    pub(crate) fn user(token: ValidatedToken) -> Self {
        Self {
            principal_type: PrincipalType::User,
            name: token.principal_name.clone(),
            token: Arc::new(token),
        }
    }

    pub fn principal_type(&self) -> PrincipalType {
        self.principal_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The validated token this principal was built from
    pub fn token(&self) -> &ValidatedToken {
        &self.token
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.principal_type, self.name)
    }
}
