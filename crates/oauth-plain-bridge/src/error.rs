//! Error types for the OAuth over PLAIN bridge

use oauth_plain_core::AuthError;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by the token validators and the token endpoint client
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Token validation failed
    #[error("Token validation failed: {0}")]
    ValidationFailed(String),

    /// Token has expired
    #[error("Token expired")]
    Expired,

    /// Token not yet valid
    #[error("Token not yet valid")]
    NotYetValid,

    /// Invalid token format
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    /// Issuer is not the configured one
    #[error("Unknown issuer: {0}")]
    UnknownIssuer(String),

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// JWKS fetch error
    #[error("Failed to fetch JWKS: {0}")]
    JwksFetchError(String),

    /// Key not found in JWKS
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Unsupported algorithm or key type
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Missing required claim
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// Invalid audience
    #[error("Invalid audience")]
    InvalidAudience,

    /// Token endpoint returned an error status
    #[error("Token endpoint responded with status {status}")]
    TokenEndpoint { status: u16 },

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl From<jsonwebtoken::errors::Error> for BridgeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => BridgeError::Expired,
            ErrorKind::ImmatureSignature => BridgeError::NotYetValid,
            ErrorKind::InvalidSignature => BridgeError::InvalidSignature,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                BridgeError::InvalidFormat(err.to_string())
            }
            ErrorKind::InvalidIssuer => BridgeError::UnknownIssuer("iss".into()),
            ErrorKind::InvalidAudience => BridgeError::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => BridgeError::MissingClaim(claim.clone()),
            _ => BridgeError::ValidationFailed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidFormat(err.to_string())
    }
}

/// Token endpoint failures are transport failures; everything else means the
/// token was rejected.
impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TokenEndpoint { .. } | BridgeError::HttpError(_) => {
                AuthError::Transport(err.to_string())
            }
            other => AuthError::Validation(other.to_string()),
        }
    }
}
