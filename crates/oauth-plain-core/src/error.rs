//! Error types for OAuth over PLAIN authentication

use thiserror::Error;

/// Result type alias using AuthError
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can terminate an authentication attempt
///
/// Every variant is terminal for the attempt. The boundary translates all of
/// them into one generic failure for the remote peer; the variant and its
/// detail are only meant for local logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or invalid static setup (no username, no token endpoint, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Token rejected by the validator
    #[error("Token validation failed: {0}")]
    Validation(String),

    /// Submitted username disagrees with the verified token subject
    #[error("Username doesn't match the token")]
    IdentityMismatch {
        /// Username submitted by the client
        username: String,
        /// Principal name resolved from the validated token
        subject: String,
    },

    /// Network or HTTP failure during the client-credentials exchange
    #[error("Token endpoint request failed: {0}")]
    Transport(String),
}

/// Discriminant of [`AuthError`], used as a structured logging field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    Configuration,
    Validation,
    IdentityMismatch,
    Transport,
}

impl AuthError {
    /// Get the kind of this error
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::Configuration(_) => AuthErrorKind::Configuration,
            AuthError::Validation(_) => AuthErrorKind::Validation,
            AuthError::IdentityMismatch { .. } => AuthErrorKind::IdentityMismatch,
            AuthError::Transport(_) => AuthErrorKind::Transport,
        }
    }
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthErrorKind::Configuration => write!(f, "configuration"),
            AuthErrorKind::Validation => write!(f, "validation"),
            AuthErrorKind::IdentityMismatch => write!(f, "identity_mismatch"),
            AuthErrorKind::Transport => write!(f, "transport"),
        }
    }
}
