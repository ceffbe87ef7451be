//! SASL/PLAIN server (RFC 4616)
//!
//! Parses the single client message `[authzid] NUL authcid NUL passwd` and
//! hands the credentials to the OAuth over PLAIN callback handler.

use thiserror::Error;
use tracing::{debug, warn};

use oauth_plain_core::Principal;

use crate::callback::{
    Callback, NameCallback, OAuthOverPlainCallbackHandler, PlainAuthenticateCallback,
    SaslAuthenticationError, PLAIN_MECHANISM,
};

/// SASL/PLAIN exchange failures
#[derive(Error, Debug)]
pub enum SaslError {
    /// The client message is malformed
    #[error("{0}")]
    InvalidResponse(String),

    /// The callback handler rejected the credentials
    #[error(transparent)]
    Authentication(#[from] SaslAuthenticationError),

    #[error("SASL/PLAIN authentication already complete")]
    AlreadyComplete,
}

/// Server side of one SASL/PLAIN exchange
pub struct PlainSaslServer {
    handler: OAuthOverPlainCallbackHandler,
    authorization_id: Option<String>,
    principal: Option<Principal>,
}

impl PlainSaslServer {
    pub fn new(handler: OAuthOverPlainCallbackHandler) -> Self {
        Self {
            handler,
            authorization_id: None,
            principal: None,
        }
    }

    pub fn mechanism_name(&self) -> &'static str {
        PLAIN_MECHANISM
    }

    /// Evaluate the client message
    ///
    /// PLAIN has no server challenge, so a successful evaluation returns an
    /// empty response and completes the exchange.
    pub async fn evaluate_response(&mut self, response: &[u8]) -> Result<Vec<u8>, SaslError> {
        if self.is_complete() {
            return Err(SaslError::AlreadyComplete);
        }

        let (authcid, passwd) = parse_credentials(response).map_err(report_invalid)?;

        let mut callbacks = [
            Callback::Name(NameCallback::new("username", Some(authcid.to_string()))),
            Callback::PlainAuthenticate(PlainAuthenticateCallback::new(passwd)),
        ];
        let principal = self.handler.handle(&mut callbacks).await?;

        debug!(authorization_id = %authcid, principal = %principal, "SASL/PLAIN exchange complete");
        self.authorization_id = Some(authcid.to_string());
        self.principal = Some(principal);
        Ok(Vec::new())
    }

    pub fn is_complete(&self) -> bool {
        self.principal.is_some()
    }

    /// The authenticated id, once the exchange is complete
    pub fn authorization_id(&self) -> Option<&str> {
        self.authorization_id.as_deref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
}

/// Extract `(authcid, passwd)`, enforcing the RFC 4616 field rules
fn parse_credentials(response: &[u8]) -> Result<(&str, &str), SaslError> {
    let message = std::str::from_utf8(response).map_err(|_| {
        SaslError::InvalidResponse("Invalid SASL/PLAIN response: not valid UTF-8".into())
    })?;
    let (authzid, authcid, passwd) = split_message(message)?;

    if authcid.is_empty() {
        return Err(SaslError::InvalidResponse(
            "Authentication failed: username not specified".into(),
        ));
    }
    if passwd.is_empty() {
        return Err(SaslError::InvalidResponse(
            "Authentication failed: password not specified".into(),
        ));
    }
    if !authzid.is_empty() && authzid != authcid {
        return Err(SaslError::InvalidResponse(
            "Authentication failed: Client requested an authorization id that is different from username"
                .into(),
        ));
    }
    Ok((authcid, passwd))
}

/// Log a malformed client message once, the way callback failures are logged
fn report_invalid(err: SaslError) -> SaslError {
    warn!(kind = "invalid_response", detail = %err, "Authentication failed");
    err
}

fn split_message(message: &str) -> Result<(&str, &str, &str), SaslError> {
    let mut tokens = message.split('\u{0}');
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(authzid), Some(authcid), Some(passwd), None) => Ok((authzid, authcid, passwd)),
        _ => Err(SaslError::InvalidResponse(
            "Invalid SASL/PLAIN response: expected 3 tokens".into(),
        )),
    }
}
