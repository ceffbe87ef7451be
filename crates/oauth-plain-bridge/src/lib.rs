//! OAuth over PLAIN Bridge
//!
//! Connects the core pipeline to a real identity provider and to a SASL/PLAIN
//! server.
//!
//! ## Components
//!
//! - **JWT/JWKS**: [`JwtValidator`] checks signatures against the provider's
//!   JWKS, plus issuer, expiry and (optionally) audience
//! - **Client credentials**: [`ClientCredentialsClient`] exchanges a client
//!   id and secret at the token endpoint
//! - **Static tokens**: [`StaticTokenValidator`] for development and tests
//! - **Callback adapter**: [`OAuthOverPlainCallbackHandler`] runs the pipeline
//!   for the callbacks of one SASL exchange
//! - **PLAIN server**: [`PlainSaslServer`] parses the RFC 4616 message
//!
//! ## Usage
//!
//! ```ignore
//! use oauth_plain_bridge::{OAuthOverPlainCallbackHandler, PlainSaslServer, ServerPlainConfig};
//! use oauth_plain_core::MemoryCredentialStore;
//!
//! let config = ServerPlainConfig::from_options(&listener_options)?;
//! let handler = OAuthOverPlainCallbackHandler::configure(
//!     "PLAIN",
//!     &config,
//!     Arc::new(MemoryCredentialStore::new()),
//! )?;
//!
//! let mut server = PlainSaslServer::new(handler);
//! server.evaluate_response(b"\0alice\0$accessToken:eyJ...").await?;
//! println!("Authenticated: {:?}", server.authorization_id());
//! ```

pub mod callback;
pub mod config;
pub mod error;
pub mod handlers;
pub mod sasl;

pub use callback::{
    Callback, NameCallback, OAuthOverPlainCallbackHandler, PlainAuthenticateCallback,
    SaslAuthenticationError, PLAIN_MECHANISM,
};
pub use config::{ClientCredentialsParams, ConfigError, ServerPlainConfig, TransportConfig};
pub use error::{BridgeError, Result};
pub use handlers::{ClientCredentialsClient, JwtValidator, JwtValidatorConfig, StaticTokenValidator};
pub use sasl::{PlainSaslServer, SaslError};
