//! API request handlers

pub mod authenticate;
pub mod principals;

pub use authenticate::{authenticate_plain, AppState, AuthenticateRequest, AuthenticateResponse};
pub use principals::{get_principal, PrincipalResponse};
