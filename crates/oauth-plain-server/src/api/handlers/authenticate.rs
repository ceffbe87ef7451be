//! SASL/PLAIN Authentication Handler
//!
//! Runs one SASL/PLAIN exchange per request. The client message is the raw
//! RFC 4616 payload, base64-encoded for transport over JSON.

use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use oauth_plain_bridge::{OAuthOverPlainCallbackHandler, PlainSaslServer};
use oauth_plain_core::CredentialStore;

use crate::api::error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    /// Configured OAuth over PLAIN callback handler
    pub handler: OAuthOverPlainCallbackHandler,
    /// Store the handler binds principals into
    pub store: Arc<dyn CredentialStore>,
    /// Bearer token guarding the operator endpoints; unset disables them
    pub admin_token: Option<String>,
}

impl AppState {
    /// Build state around `handler`, sharing its credential store
    pub fn new(handler: OAuthOverPlainCallbackHandler) -> Self {
        let store = handler.authenticator().store().clone();
        Self {
            handler,
            store,
            admin_token: None,
        }
    }

    /// Enable the operator endpoints behind `token`
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.admin_token = (!token.is_empty()).then_some(token);
        self
    }
}

/// SASL/PLAIN authentication request
#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    /// Base64-encoded `[authzid] NUL authcid NUL passwd`
    pub auth_bytes: String,
}

/// Successful authentication
#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    /// Authenticated id the principal is stored under
    pub authorization_id: String,

    /// Principal name taken from the token
    pub principal: String,

    pub principal_type: String,

    /// Token expiry
    pub expires_at: DateTime<Utc>,
}

/// Authenticate a SASL/PLAIN client message
///
/// POST /v1/sasl/plain
pub async fn authenticate_plain(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let auth_bytes = STANDARD.decode(request.auth_bytes.trim())?;

    let mut server = PlainSaslServer::new(state.handler.clone());
    server.evaluate_response(&auth_bytes).await?;

    let (authorization_id, principal) = server
        .authorization_id()
        .zip(server.principal())
        .ok_or_else(|| ApiError::Internal("exchange did not complete".into()))?;

    info!(
        authorization_id = %authorization_id,
        principal = %principal,
        "SASL/PLAIN authentication succeeded"
    );

    Ok(Json(AuthenticateResponse {
        authorization_id: authorization_id.to_string(),
        principal: principal.name().to_string(),
        principal_type: principal.principal_type().to_string(),
        expires_at: principal.token().expires_at,
    }))
}
