//! API module for the OAuth over PLAIN server

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use oauth_plain_core::CredentialStore;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub client_credentials_enabled: bool,
    pub bound_principals: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        client_credentials_enabled: state
            .handler
            .authenticator()
            .resolver()
            .token_endpoint_configured(),
        bound_principals: state.store.len().await,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Authentication endpoints
        .route("/v1/sasl/plain", post(handlers::authenticate_plain))
        .route("/v1/principals/{username}", get(handlers::get_principal))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
