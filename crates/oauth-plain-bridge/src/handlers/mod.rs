//! Token validators and the token endpoint client

pub mod client_credentials;
pub mod jwt;
pub mod static_tokens;

pub use client_credentials::ClientCredentialsClient;
pub use jwt::{JwtValidator, JwtValidatorConfig};
pub use static_tokens::StaticTokenValidator;
