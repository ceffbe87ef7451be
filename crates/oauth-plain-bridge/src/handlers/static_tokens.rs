//! Static Token Validator
//!
//! For development and testing - validates tokens against a fixed table.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use oauth_plain_core::{TokenValidator, ValidatedToken};

use crate::error::BridgeError;

#[derive(Debug, Clone)]
struct StaticToken {
    subject: String,
    expires_at: DateTime<Utc>,
    scopes: Vec<String>,
}

/// Token validator backed by an in-memory token → subject table
///
/// Tokens are valid for one hour from registration unless registered with
/// an explicit expiry. Unknown and expired tokens are rejected.
#[derive(Debug, Default)]
pub struct StaticTokenValidator {
    tokens: DashMap<String, StaticToken>,
}

impl StaticTokenValidator {
    /// Create an empty validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for `subject`
    pub fn with_token(self, token: impl Into<String>, subject: impl Into<String>) -> Self {
        self.register(token, subject, Utc::now() + Duration::hours(1), Vec::new());
        self
    }

    /// Register a token with explicit expiry and scopes
    pub fn register(
        &self,
        token: impl Into<String>,
        subject: impl Into<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
    ) {
        self.tokens.insert(
            token.into(),
            StaticToken {
                subject: subject.into(),
                expires_at,
                scopes,
            },
        );
    }

    /// Remove a token
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    fn description(&self) -> &str {
        "static token validator"
    }

    async fn validate(&self, bearer_token: &str) -> oauth_plain_core::Result<ValidatedToken> {
        let entry = self
            .tokens
            .get(bearer_token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BridgeError::ValidationFailed("unknown token".into()))?;

        if entry.expires_at < Utc::now() {
            return Err(BridgeError::Expired.into());
        }

        debug!(subject = %entry.subject, "Static token accepted");

        Ok(ValidatedToken::new(entry.subject.clone(), entry.expires_at)
            .with_scopes(entry.scopes)
            .with_payload(serde_json::json!({ "sub": entry.subject })))
    }
}
