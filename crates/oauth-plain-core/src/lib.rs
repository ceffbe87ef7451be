//! # OAuth over PLAIN Core
//!
//! Lets clients that only speak SASL/PLAIN authenticate against an OAuth 2.0
//! identity provider. The password field carries one of:
//!
//! - **`$accessToken:<token>`**: an access token, explicitly marked
//! - **a raw access token**: when no token endpoint is configured
//! - **a client secret**: exchanged at the token endpoint, with the username
//!   as the client id
//!
//! ## Pipeline
//!
//! 1. [`CredentialResolver`] classifies the password and produces a bearer token
//! 2. a [`TokenValidator`] verifies it (signature, issuer, expiry, claims)
//! 3. [`PrincipalBinder`] checks the subject against the username where
//!    required, then stores the [`Principal`] in a [`CredentialStore`]
//!
//! [`Authenticator`] runs the three steps for one attempt.

pub mod authenticator;
pub mod binder;
pub mod error;
pub mod gateway;
pub mod resolver;
pub mod store;
pub mod types;

pub use authenticator::Authenticator;
pub use binder::PrincipalBinder;
pub use error::{AuthError, AuthErrorKind, Result};
pub use gateway::{TokenAcquirer, TokenValidator};
pub use resolver::{classify, CredentialResolver, TokenSource, ACCESS_TOKEN_PREFIX};
pub use store::{CredentialStore, MemoryCredentialStore};
pub use types::{
    CredentialSubmission, Principal, PrincipalType, ResolvedTokenRequest, TokenSourceKind,
    ValidatedToken,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
