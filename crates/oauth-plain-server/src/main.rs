//! OAuth over PLAIN Server Binary
//!
//! Runs the HTTP server. Listener options are read from the environment
//! (`OAUTH_VALID_ISSUER_URI`, `OAUTH_JWKS_ENDPOINT_URI`,
//! `OAUTH_TOKEN_ENDPOINT_URI`, ...). `OAUTH_PLAIN_ADMIN_TOKEN` enables the
//! operator-only principal lookup.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oauth_plain_bridge::{OAuthOverPlainCallbackHandler, ServerPlainConfig, PLAIN_MECHANISM};
use oauth_plain_core::{CredentialStore, MemoryCredentialStore};
use oauth_plain_server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let log_level = env::var("OAUTH_PLAIN_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Configuration
    let port: u16 = env::var("OAUTH_PLAIN_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .map_err(|_| "OAUTH_PLAIN_PORT must be a valid port number")?;

    let config = ServerPlainConfig::from_options(&HashMap::new())?;

    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    let handler = OAuthOverPlainCallbackHandler::configure(PLAIN_MECHANISM, &config, store)?;

    info!(
        port = port,
        token_endpoint = ?config.token_endpoint_uri.as_ref().map(|u| u.as_str()),
        issuer = ?config.jwt.as_ref().map(|jwt| jwt.issuer.as_str()),
        "Starting OAuth over PLAIN server"
    );

    let mut state = AppState::new(handler);
    match env::var("OAUTH_PLAIN_ADMIN_TOKEN") {
        Ok(token) if !token.is_empty() => state = state.with_admin_token(token),
        _ => info!("OAUTH_PLAIN_ADMIN_TOKEN not set, principal lookup disabled"),
    }
    let state = Arc::new(state);
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(addr = %addr, "OAuth over PLAIN server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
