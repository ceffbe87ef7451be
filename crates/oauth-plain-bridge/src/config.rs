//! Listener configuration for OAuth over PLAIN
//!
//! Settings arrive as listener options (string key/value pairs). A key not
//! set as an option falls back to an environment variable named after the
//! key, upper-cased with `.` replaced by `_` (`oauth.token.endpoint.uri` →
//! `OAUTH_TOKEN_ENDPOINT_URI`), then to its default.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::handlers::JwtValidatorConfig;

pub const OAUTH_TOKEN_ENDPOINT_URI: &str = "oauth.token.endpoint.uri";
pub const OAUTH_VALID_ISSUER_URI: &str = "oauth.valid.issuer.uri";
pub const OAUTH_JWKS_ENDPOINT_URI: &str = "oauth.jwks.endpoint.uri";
pub const OAUTH_JWKS_EXPIRY_SECONDS: &str = "oauth.jwks.expiry.seconds";
pub const OAUTH_JWKS_REFRESH_MIN_PAUSE_SECONDS: &str = "oauth.jwks.refresh.min.pause.seconds";
pub const OAUTH_USERNAME_CLAIM: &str = "oauth.username.claim";
pub const OAUTH_CHECK_AUDIENCE: &str = "oauth.check.audience";
pub const OAUTH_CLIENT_ID: &str = "oauth.client.id";
pub const OAUTH_SCOPE: &str = "oauth.scope";
pub const OAUTH_AUDIENCE: &str = "oauth.audience";
pub const OAUTH_CONNECT_TIMEOUT_SECONDS: &str = "oauth.connect.timeout.seconds";
pub const OAUTH_READ_TIMEOUT_SECONDS: &str = "oauth.read.timeout.seconds";
pub const OAUTH_HTTP_RETRIES: &str = "oauth.http.retries";
pub const OAUTH_HTTP_RETRY_PAUSE_MILLIS: &str = "oauth.http.retry.pause.millis";
pub const OAUTH_SSL_TRUSTSTORE_CERTIFICATES: &str = "oauth.ssl.truststore.certificates";

/// Errors raised while loading listener configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unexpected SASL mechanism: {0}")]
    UnsupportedMechanism(String),

    #[error("Invalid {key}: {value} ({reason})")]
    InvalidUri {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid TLS configuration: {0}")]
    Tls(String),
}

/// HTTP transport policy shared by the token endpoint and JWKS clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Extra attempts after a connection error or 5xx response
    pub retries: u32,
    pub retry_pause: Duration,
    /// PEM-encoded certificates trusted in addition to the platform roots
    pub truststore_certificates: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(60),
            retries: 0,
            retry_pause: Duration::ZERO,
            truststore_certificates: None,
        }
    }
}

impl TransportConfig {
    /// Build a reqwest client applying timeouts and trusted certificates
    pub fn build_client(&self) -> Result<reqwest::Client, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout);

        if let Some(pem) = &self.truststore_certificates {
            let certificates = reqwest::Certificate::from_pem_bundle(pem.as_bytes())
                .map_err(|e| ConfigError::Tls(e.to_string()))?;
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        builder.build().map_err(|e| ConfigError::Tls(e.to_string()))
    }
}

/// Extra form parameters for the client-credentials request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCredentialsParams {
    pub scope: Option<String>,
    pub audience: Option<String>,
}

/// Resolved OAuth over PLAIN listener configuration
#[derive(Debug, Clone)]
pub struct ServerPlainConfig {
    /// Token endpoint for client credentials; `None` disables that mode
    pub token_endpoint_uri: Option<Url>,
    /// JWT validation settings, when issuer and JWKS endpoint are configured
    pub jwt: Option<JwtValidatorConfig>,
    pub client_credentials: ClientCredentialsParams,
    pub transport: TransportConfig,
}

impl ServerPlainConfig {
    /// Load from listener options, falling back to process environment
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_sources(options, |name| std::env::var(name).ok())
    }

    /// Load from listener options, falling back to `env`
    pub fn from_sources<F>(options: &HashMap<String, String>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = ConfigLookup { options, env };

        let token_endpoint_uri = lookup.url(OAUTH_TOKEN_ENDPOINT_URI)?;

        let issuer = lookup.string(OAUTH_VALID_ISSUER_URI);
        let jwks_url = lookup.url(OAUTH_JWKS_ENDPOINT_URI)?;
        let jwt = match (issuer, jwks_url) {
            (Some(issuer), Some(jwks_url)) => {
                let mut jwt = JwtValidatorConfig::new(issuer, jwks_url);
                if let Some(claim) = lookup.string(OAUTH_USERNAME_CLAIM) {
                    jwt = jwt.with_username_claim(claim);
                }
                if let Some(seconds) = lookup.number::<u64>(OAUTH_JWKS_EXPIRY_SECONDS)? {
                    jwt = jwt.with_jwks_expiry(Duration::from_secs(seconds));
                }
                if let Some(seconds) = lookup.number::<u64>(OAUTH_JWKS_REFRESH_MIN_PAUSE_SECONDS)? {
                    jwt = jwt.with_jwks_refresh_min_pause(Duration::from_secs(seconds));
                }
                if lookup.boolean(OAUTH_CHECK_AUDIENCE)?.unwrap_or(false) {
                    let client_id = lookup
                        .string(OAUTH_CLIENT_ID)
                        .ok_or(ConfigError::Missing(OAUTH_CLIENT_ID))?;
                    jwt = jwt.with_audience(client_id);
                }
                Some(jwt)
            }
            (None, None) => None,
            (None, Some(_)) => return Err(ConfigError::Missing(OAUTH_VALID_ISSUER_URI)),
            (Some(_), None) => return Err(ConfigError::Missing(OAUTH_JWKS_ENDPOINT_URI)),
        };

        let defaults = TransportConfig::default();
        let transport = TransportConfig {
            connect_timeout: lookup
                .number::<u64>(OAUTH_CONNECT_TIMEOUT_SECONDS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            read_timeout: lookup
                .number::<u64>(OAUTH_READ_TIMEOUT_SECONDS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_timeout),
            retries: lookup.number::<u32>(OAUTH_HTTP_RETRIES)?.unwrap_or(defaults.retries),
            retry_pause: lookup
                .number::<u64>(OAUTH_HTTP_RETRY_PAUSE_MILLIS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_pause),
            truststore_certificates: lookup.string(OAUTH_SSL_TRUSTSTORE_CERTIFICATES),
        };

        Ok(Self {
            token_endpoint_uri,
            jwt,
            client_credentials: ClientCredentialsParams {
                scope: lookup.string(OAUTH_SCOPE),
                audience: lookup.string(OAUTH_AUDIENCE),
            },
            transport,
        })
    }
}

/// Environment variable name for a configuration key
pub fn env_var_name(key: &str) -> String {
    key.to_uppercase().replace('.', "_")
}

struct ConfigLookup<'a, F> {
    options: &'a HashMap<String, String>,
    env: F,
}

impl<F> ConfigLookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        self.options
            .get(key)
            .cloned()
            .or_else(|| (self.env)(&env_var_name(key)))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn url(&self, key: &'static str) -> Result<Option<Url>, ConfigError> {
        self.string(key)
            .map(|value| {
                Url::parse(&value).map_err(|e| ConfigError::InvalidUri {
                    key,
                    value,
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn number<T: std::str::FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.string(key)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|_| ConfigError::InvalidValue { key, value })
            })
            .transpose()
    }

    fn boolean(&self, key: &'static str) -> Result<Option<bool>, ConfigError> {
        self.string(key)
            .map(|value| match value.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConfigError::InvalidValue { key, value }),
            })
            .transpose()
    }
}
