//! OAuth over PLAIN Server
//!
//! HTTP front end for the OAuth over PLAIN bridge. Each request carries one
//! RFC 4616 client message; a successful exchange binds the token's
//! principal to the username in the credential store.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with store and mode info
//! - `POST /v1/sasl/plain` - Authenticate a base64 SASL/PLAIN message
//! - `GET /v1/principals/{username}` - Principal bound to a username
//!   (operator-only, requires the `OAUTH_PLAIN_ADMIN_TOKEN` bearer token)

pub mod api;

pub use api::create_router;
pub use api::error::ApiError;
pub use api::handlers::AppState;
