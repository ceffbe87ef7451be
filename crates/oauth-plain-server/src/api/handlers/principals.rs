//! Principal Lookup Handler
//!
//! Exposes the credential store the way the authorization layer reads it:
//! by the username the connection authenticated as. Operator-only: requests
//! must carry `Authorization: Bearer <admin token>`, and the endpoint stays
//! disabled until an admin token is configured.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use oauth_plain_core::CredentialStore;

use crate::api::error::ApiError;
use crate::api::handlers::authenticate::AppState;

/// Principal bound to a username
#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub username: String,
    pub principal: String,
    pub principal_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    /// Whether the token behind the principal has since expired
    pub expired: bool,
}

/// Look up the principal bound to a username
///
/// GET /v1/principals/{username}
pub async fn get_principal(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PrincipalResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let principal = state
        .store
        .get(&username)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No principal bound to '{}'", username)))?;

    let token = principal.token();
    Ok(Json(PrincipalResponse {
        principal: principal.name().to_string(),
        principal_type: principal.principal_type().to_string(),
        expires_at: token.expires_at,
        issued_at: token.issued_at,
        scopes: token.scopes.clone(),
        expired: token.is_expired(),
        username,
    }))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| ApiError::Forbidden("principal lookup is disabled".into()))?;

    match bearer_token(headers) {
        Some(presented) if tokens_match(presented, expected) => Ok(()),
        presented => {
            warn!(
                token_present = presented.is_some(),
                "Principal lookup rejected"
            );
            Err(ApiError::Unauthorized("admin token required".into()))
        }
    }
}

/// Extract Bearer token from Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
}

/// Compare without short-circuiting on the first differing byte
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
