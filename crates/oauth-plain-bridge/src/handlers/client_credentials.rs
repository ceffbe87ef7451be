//! Client Credentials Token Client
//!
//! Obtains access tokens from an OAuth 2.0 token endpoint using the
//! `client_credentials` grant, authenticating with HTTP Basic.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use oauth_plain_core::{AuthError, TokenAcquirer};

use crate::config::{ClientCredentialsParams, ConfigError, TransportConfig};
use crate::error::{BridgeError, Result};

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Reqwest-backed client for the client-credentials grant
///
/// Connection errors and 5xx responses are retried `retries` times with
/// `retry_pause` between attempts; any other failure is returned at once.
pub struct ClientCredentialsClient {
    http_client: reqwest::Client,
    params: ClientCredentialsParams,
    retries: u32,
    retry_pause: Duration,
}

impl ClientCredentialsClient {
    /// Create a client from transport settings
    pub fn new(
        transport: &TransportConfig,
        params: ClientCredentialsParams,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self::with_http_client(transport.build_client()?, transport, params))
    }

    /// Create a client with an injected HTTP client (custom TLS, proxies, ...)
    pub fn with_http_client(
        http_client: reqwest::Client,
        transport: &TransportConfig,
        params: ClientCredentialsParams,
    ) -> Self {
        Self {
            http_client,
            params,
            retries: transport.retries,
            retry_pause: transport.retry_pause,
        }
    }

    async fn request_token(
        &self,
        endpoint: &Url,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String> {
        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scope) = &self.params.scope {
            form.push(("scope", scope.as_str()));
        }
        if let Some(audience) = &self.params.audience {
            form.push(("audience", audience.as_str()));
        }

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            let result = self
                .http_client
                .post(endpoint.clone())
                .basic_auth(client_id, Some(client_secret))
                .form(&form)
                .send()
                .await;

            let retryable = match &result {
                Ok(response) => response.status().is_server_error(),
                Err(e) => !e.is_builder(),
            };
            if !retryable || attempt > self.retries {
                break result?;
            }

            warn!(
                endpoint = %endpoint,
                attempt,
                "Token endpoint request failed, retrying"
            );
            tokio::time::sleep(self.retry_pause).await;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::TokenEndpoint {
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = response.json().await?;
        debug!(
            client_id = %client_id,
            token_type = ?body.token_type,
            expires_in = ?body.expires_in,
            "Obtained access token"
        );

        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| BridgeError::MissingClaim("access_token".into()))
    }
}

#[async_trait]
impl TokenAcquirer for ClientCredentialsClient {
    fn description(&self) -> &str {
        "client credentials client"
    }

    async fn acquire_token(
        &self,
        endpoint: &Url,
        client_id: &str,
        client_secret: &str,
    ) -> oauth_plain_core::Result<String> {
        self.request_token(endpoint, client_id, client_secret)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use mockito::Matcher;

    fn client(retries: u32, params: ClientCredentialsParams) -> ClientCredentialsClient {
        let transport = TransportConfig {
            retries,
            ..TransportConfig::default()
        };
        ClientCredentialsClient::with_http_client(reqwest::Client::new(), &transport, params)
    }

    fn endpoint(server: &mockito::Server) -> Url {
        Url::parse(&format!("{}/token", server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_header(
                "authorization",
                format!("Basic {}", STANDARD.encode("client1:secretXYZ")).as_str(),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("scope".into(), "kafka".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"issued-token","token_type":"Bearer","expires_in":300}"#)
            .create_async()
            .await;

        let client = client(
            0,
            ClientCredentialsParams {
                scope: Some("kafka".into()),
                audience: None,
            },
        );
        let token = client
            .acquire_token(&endpoint(&server), "client1", "secretXYZ")
            .await
            .unwrap();

        assert_eq!(token, "issued-token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_credentials_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = client(3, ClientCredentialsParams::default())
            .acquire_token(&endpoint(&server), "client1", "wrong")
            .await;

        assert!(matches!(result, Err(AuthError::Transport(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let result = client(2, ClientCredentialsParams::default())
            .acquire_token(&endpoint(&server), "client1", "secretXYZ")
            .await;

        assert!(matches!(result, Err(AuthError::Transport(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_access_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_body(r#"{"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let result = client(0, ClientCredentialsParams::default())
            .acquire_token(&endpoint(&server), "client1", "secretXYZ")
            .await;

        assert!(matches!(result, Err(AuthError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let endpoint = Url::parse("http://127.0.0.1:1/token").unwrap();

        let result = client(0, ClientCredentialsParams::default())
            .acquire_token(&endpoint, "client1", "secretXYZ")
            .await;

        assert!(matches!(result, Err(AuthError::Transport(_))));
    }
}
