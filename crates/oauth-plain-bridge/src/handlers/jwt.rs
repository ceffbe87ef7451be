//! JWT Token Validator
//!
//! Validates JWT access tokens from the configured issuer using its JWKS.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use oauth_plain_core::{TokenValidator, ValidatedToken};

use crate::config::{ConfigError, TransportConfig};
use crate::error::{BridgeError, Result};

/// Configuration for JWT validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtValidatorConfig {
    /// Expected issuer (iss claim)
    pub issuer: String,

    /// URL to fetch JWKS from
    pub jwks_url: Url,

    /// Expected audience (aud claim), if checked
    pub audience: Option<String>,

    /// Claim holding the principal name (default: "sub")
    pub username_claim: String,

    /// Allowed algorithms (default: RS256, ES256)
    pub algorithms: Vec<String>,

    /// How long a fetched JWKS stays cached
    pub jwks_expiry: Duration,

    /// Minimum time between refreshes forced by an unknown `kid`
    pub jwks_refresh_min_pause: Duration,
}

fn default_username_claim() -> String {
    "sub".to_string()
}

fn default_algorithms() -> Vec<String> {
    vec!["RS256".to_string(), "ES256".to_string()]
}

impl JwtValidatorConfig {
    pub fn new(issuer: impl Into<String>, jwks_url: Url) -> Self {
        Self {
            issuer: issuer.into(),
            jwks_url,
            audience: None,
            username_claim: default_username_claim(),
            algorithms: default_algorithms(),
            jwks_expiry: Duration::from_secs(360),
            jwks_refresh_min_pause: Duration::from_secs(1),
        }
    }

    /// Set the expected audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set the claim holding the principal name
    pub fn with_username_claim(mut self, claim: impl Into<String>) -> Self {
        self.username_claim = claim.into();
        self
    }

    pub fn with_algorithms(mut self, algorithms: Vec<String>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_jwks_expiry(mut self, expiry: Duration) -> Self {
        self.jwks_expiry = expiry;
        self
    }

    pub fn with_jwks_refresh_min_pause(mut self, pause: Duration) -> Self {
        self.jwks_refresh_min_pause = pause;
        self
    }
}

/// JWKS (JSON Web Key Set) response
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

/// Individual JWK (JSON Web Key)
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    /// Key ID
    kid: Option<String>,
    /// Key type
    kty: String,
    /// Use (sig for signing)
    #[serde(rename = "use")]
    key_use: Option<String>,
    /// RSA modulus
    n: Option<String>,
    /// RSA exponent
    e: Option<String>,
    /// EC x coordinate
    x: Option<String>,
    /// EC y coordinate
    y: Option<String>,
    /// Symmetric key value
    k: Option<String>,
}

/// JWT access token validator
pub struct JwtValidator {
    config: JwtValidatorConfig,
    /// JWKS cache (jwks url -> JWKS)
    jwks_cache: Cache<String, Arc<JwksResponse>>,
    /// When an unknown `kid` last forced a JWKS refresh
    last_forced_refresh: Mutex<Option<Instant>>,
    http_client: reqwest::Client,
}

impl JwtValidator {
    /// Create a validator using the given transport settings for JWKS fetches
    pub fn new(config: JwtValidatorConfig, transport: &TransportConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self::with_http_client(config, transport.build_client()?))
    }

    /// Create a validator with an injected HTTP client
    pub fn with_http_client(config: JwtValidatorConfig, http_client: reqwest::Client) -> Self {
        Self {
            jwks_cache: Cache::builder()
                .time_to_live(config.jwks_expiry)
                .max_capacity(16)
                .build(),
            last_forced_refresh: Mutex::new(None),
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &JwtValidatorConfig {
        &self.config
    }

    /// Fetch JWKS (with caching)
    async fn fetch_jwks(&self) -> Result<Arc<JwksResponse>> {
        let url = self.config.jwks_url.as_str();

        if let Some(cached) = self.jwks_cache.get(url).await {
            debug!(url = %url, "Using cached JWKS");
            return Ok(cached);
        }

        debug!(url = %url, "Fetching JWKS");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| BridgeError::JwksFetchError(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::JwksFetchError(e.to_string()))?;

        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::JwksFetchError(e.to_string()))?;

        let jwks = Arc::new(jwks);
        self.jwks_cache.insert(url.to_string(), jwks.clone()).await;

        Ok(jwks)
    }

    /// Find the verification key, refreshing the JWKS once on an unknown kid
    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey> {
        let jwks = self.fetch_jwks().await?;
        match find_key(&jwks, kid) {
            Ok(jwk) => decoding_key_from_jwk(jwk),
            Err(BridgeError::KeyNotFound(missing)) => {
                if !self.begin_forced_refresh() {
                    debug!(kid = ?kid, "Unknown key id, JWKS refreshed too recently");
                    return Err(BridgeError::KeyNotFound(missing));
                }
                debug!(kid = ?kid, "Unknown key id, refreshing JWKS");
                self.jwks_cache.invalidate(self.config.jwks_url.as_str()).await;
                let jwks = self.fetch_jwks().await?;
                decoding_key_from_jwk(find_key(&jwks, kid)?)
            }
            Err(e) => Err(e),
        }
    }

    /// Claim the forced-refresh slot unless one was taken within the pause
    fn begin_forced_refresh(&self) -> bool {
        let mut last = self
            .last_forced_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.config.jwks_refresh_min_pause => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    fn algorithm_allowed(&self, alg: Algorithm) -> bool {
        self.config
            .algorithms
            .iter()
            .any(|name| name.parse::<Algorithm>().ok() == Some(alg))
    }

    async fn validate_jwt(&self, token: &str) -> Result<ValidatedToken> {
        let header = decode_header(token).map_err(|e| BridgeError::InvalidFormat(e.to_string()))?;
        let alg = header.alg;
        if !self.algorithm_allowed(alg) {
            return Err(BridgeError::UnsupportedAlgorithm(format!("{:?}", alg)));
        }

        let decoding_key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(alg);
        validation.set_issuer(&[&self.config.issuer]);
        match &self.config.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<serde_json::Value>(token, &decoding_key, &validation)?.claims;

        let principal_name = claims
            .get(&self.config.username_claim)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BridgeError::MissingClaim(self.config.username_claim.clone()))?
            .to_string();

        let expires_at = claims
            .get("exp")
            .and_then(|v| v.as_i64())
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
            .ok_or_else(|| BridgeError::MissingClaim("exp".into()))?;

        let mut validated = ValidatedToken::new(principal_name, expires_at);

        if let Some(iat) = claims
            .get("iat")
            .and_then(|v| v.as_i64())
            .and_then(|iat| Utc.timestamp_opt(iat, 0).single())
        {
            validated = validated.with_issued_at(iat);
        }

        if let Some(scope) = claims.get("scope").and_then(|v| v.as_str()) {
            validated = validated.with_scopes(scope.split_whitespace().map(String::from).collect());
        }

        Ok(validated.with_payload(claims))
    }
}

/// Find a key in JWKS by key ID
fn find_key<'a>(jwks: &'a JwksResponse, kid: Option<&str>) -> Result<&'a Jwk> {
    match kid {
        Some(kid) => jwks
            .keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid))
            .ok_or_else(|| BridgeError::KeyNotFound(kid.to_string())),
        None => {
            // If no kid, use the first signing key
            jwks.keys
                .iter()
                .find(|k| k.key_use.as_deref() == Some("sig") || k.key_use.is_none())
                .ok_or_else(|| BridgeError::KeyNotFound("no signing key found".to_string()))
        }
    }
}

/// Create a decoding key from a JWK
fn decoding_key_from_jwk(jwk: &Jwk) -> Result<DecodingKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk
                .n
                .as_ref()
                .ok_or_else(|| BridgeError::InvalidFormat("Missing RSA modulus".into()))?;
            let e = jwk
                .e
                .as_ref()
                .ok_or_else(|| BridgeError::InvalidFormat("Missing RSA exponent".into()))?;

            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| BridgeError::InvalidFormat(e.to_string()))
        }
        "EC" => {
            let x = jwk
                .x
                .as_ref()
                .ok_or_else(|| BridgeError::InvalidFormat("Missing EC x coordinate".into()))?;
            let y = jwk
                .y
                .as_ref()
                .ok_or_else(|| BridgeError::InvalidFormat("Missing EC y coordinate".into()))?;

            DecodingKey::from_ec_components(x, y)
                .map_err(|e| BridgeError::InvalidFormat(e.to_string()))
        }
        "oct" => {
            let k = jwk
                .k
                .as_ref()
                .ok_or_else(|| BridgeError::InvalidFormat("Missing symmetric key value".into()))?;
            let secret = URL_SAFE_NO_PAD
                .decode(k)
                .map_err(|e| BridgeError::InvalidFormat(e.to_string()))?;

            Ok(DecodingKey::from_secret(&secret))
        }
        kty => Err(BridgeError::UnsupportedAlgorithm(format!("Key type: {}", kty))),
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    fn description(&self) -> &str {
        "JWT/JWKS validator"
    }

    async fn validate(&self, bearer_token: &str) -> oauth_plain_core::Result<ValidatedToken> {
        Ok(self.validate_jwt(bearer_token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use oauth_plain_core::AuthError;
    use serde_json::json;

    const SECRET: &[u8] = b"an-hmac-secret-long-enough-for-hs256";
    const ISSUER: &str = "https://sso.example.com/realms/kafka";

    fn jwks_body() -> String {
        json!({
            "keys": [{
                "kid": "k1",
                "kty": "oct",
                "use": "sig",
                "k": URL_SAFE_NO_PAD.encode(SECRET),
            }]
        })
        .to_string()
    }

    fn mint(kid: &str, claims: serde_json::Value) -> String {
        let header = Header {
            kid: Some(kid.to_string()),
            ..Header::new(Algorithm::HS256)
        };
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn claims(sub: &str, exp_offset: i64) -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": ISSUER,
            "sub": sub,
            "preferred_username": format!("{}-display", sub),
            "iat": now,
            "exp": now + exp_offset,
            "scope": "profile kafka",
        })
    }

    fn validator(server: &mockito::Server) -> JwtValidator {
        let jwks_url = Url::parse(&format!("{}/certs", server.url())).unwrap();
        JwtValidator::with_http_client(
            JwtValidatorConfig::new(ISSUER, jwks_url).with_algorithms(vec!["HS256".into()]),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_validator_config() {
        let config = JwtValidatorConfig::new(ISSUER, Url::parse("https://sso/certs").unwrap())
            .with_audience("kafka-broker")
            .with_username_claim("preferred_username");

        assert_eq!(config.audience, Some("kafka-broker".to_string()));
        assert_eq!(config.username_claim, "preferred_username");
        assert_eq!(config.algorithms, vec!["RS256", "ES256"]);
    }

    #[tokio::test]
    async fn test_valid_token() {
        let mut server = mockito::Server::new_async().await;
        let jwks = server
            .mock("GET", "/certs")
            .with_header("content-type", "application/json")
            .with_body(jwks_body())
            .expect(1)
            .create_async()
            .await;
        let validator = validator(&server);

        let token = mint("k1", claims("alice", 300));
        let validated = validator.validate(&token).await.unwrap();
        assert_eq!(validated.principal_name, "alice");
        assert_eq!(validated.scopes, vec!["profile", "kafka"]);
        assert!(validated.issued_at.is_some());
        assert_eq!(validated.payload["iss"], ISSUER);

        // Second validation uses the cached JWKS
        validator.validate(&token).await.unwrap();
        jwks.assert_async().await;
    }

    #[tokio::test]
    async fn test_username_claim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/certs")
            .with_body(jwks_body())
            .create_async()
            .await;
        let jwks_url = Url::parse(&format!("{}/certs", server.url())).unwrap();
        let validator = JwtValidator::with_http_client(
            JwtValidatorConfig::new(ISSUER, jwks_url)
                .with_algorithms(vec!["HS256".into()])
                .with_username_claim("preferred_username"),
            reqwest::Client::new(),
        );

        let validated = validator.validate(&mint("k1", claims("alice", 300))).await.unwrap();
        assert_eq!(validated.principal_name, "alice-display");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/certs")
            .with_body(jwks_body())
            .create_async()
            .await;
        let validator = validator(&server);

        let result = validator.validate(&mint("k1", claims("alice", -600))).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_wrong_issuer() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/certs")
            .with_body(jwks_body())
            .create_async()
            .await;
        let validator = validator(&server);

        let mut claims = claims("alice", 300);
        claims["iss"] = json!("https://evil.example.com");
        let result = validator.validate_jwt(&mint("k1", claims)).await;
        assert!(matches!(result, Err(BridgeError::UnknownIssuer(_))));
    }

    #[tokio::test]
    async fn test_unknown_kid_refreshes_jwks() {
        let mut server = mockito::Server::new_async().await;
        let jwks = server
            .mock("GET", "/certs")
            .with_body(jwks_body())
            .expect(2)
            .create_async()
            .await;
        let validator = validator(&server);

        let result = validator.validate_jwt(&mint("rotated", claims("alice", 300))).await;
        assert!(matches!(result, Err(BridgeError::KeyNotFound(_))));
        jwks.assert_async().await;
    }

    #[tokio::test]
    async fn test_forged_kids_refresh_once_per_pause() {
        let mut server = mockito::Server::new_async().await;
        // Initial fetch plus one forced refresh, however many forged kids arrive
        let jwks = server
            .mock("GET", "/certs")
            .with_body(jwks_body())
            .expect(2)
            .create_async()
            .await;
        let jwks_url = Url::parse(&format!("{}/certs", server.url())).unwrap();
        let validator = JwtValidator::with_http_client(
            JwtValidatorConfig::new(ISSUER, jwks_url)
                .with_algorithms(vec!["HS256".into()])
                .with_jwks_refresh_min_pause(Duration::from_secs(60)),
            reqwest::Client::new(),
        );

        for i in 0..10 {
            let token = mint(&format!("forged-{}", i), claims("alice", 300));
            let result = validator.validate_jwt(&token).await;
            assert!(matches!(result, Err(BridgeError::KeyNotFound(_))));
        }

        // Known keys keep validating from the cache
        validator.validate_jwt(&mint("k1", claims("alice", 300))).await.unwrap();
        jwks.assert_async().await;
    }

    #[tokio::test]
    async fn test_zero_pause_refreshes_every_unknown_kid() {
        let mut server = mockito::Server::new_async().await;
        let jwks = server
            .mock("GET", "/certs")
            .with_body(jwks_body())
            .expect(4)
            .create_async()
            .await;
        let jwks_url = Url::parse(&format!("{}/certs", server.url())).unwrap();
        let validator = JwtValidator::with_http_client(
            JwtValidatorConfig::new(ISSUER, jwks_url)
                .with_algorithms(vec!["HS256".into()])
                .with_jwks_refresh_min_pause(Duration::ZERO),
            reqwest::Client::new(),
        );

        for i in 0..3 {
            let token = mint(&format!("rotated-{}", i), claims("alice", 300));
            assert!(validator.validate_jwt(&token).await.is_err());
        }
        jwks.assert_async().await;
    }

    #[tokio::test]
    async fn test_jwks_cache_expiry_refetches() {
        let mut server = mockito::Server::new_async().await;
        let jwks = server
            .mock("GET", "/certs")
            .with_body(jwks_body())
            .expect(2)
            .create_async()
            .await;
        let jwks_url = Url::parse(&format!("{}/certs", server.url())).unwrap();
        let validator = JwtValidator::with_http_client(
            JwtValidatorConfig::new(ISSUER, jwks_url)
                .with_algorithms(vec!["HS256".into()])
                .with_jwks_expiry(Duration::from_millis(200)),
            reqwest::Client::new(),
        );

        let token = mint("k1", claims("alice", 300));
        validator.validate_jwt(&token).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        validator.validate_jwt(&token).await.unwrap();
        jwks.assert_async().await;
    }

    // =========================================================================
    // Asymmetric keys
    // =========================================================================

    const RSA_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/rsa_private.pem");
    const RSA_JWKS: &str = include_str!("../../tests/fixtures/rsa_jwks.json");
    const EC_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/ec_private.pem");
    const EC_JWKS: &str = include_str!("../../tests/fixtures/ec_jwks.json");

    async fn asymmetric_validator(jwks_body: &str) -> (mockito::ServerGuard, JwtValidator) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/certs")
            .with_header("content-type", "application/json")
            .with_body(jwks_body)
            .create_async()
            .await;
        let jwks_url = Url::parse(&format!("{}/certs", server.url())).unwrap();
        // Default algorithms: RS256 and ES256
        let validator = JwtValidator::with_http_client(
            JwtValidatorConfig::new(ISSUER, jwks_url),
            reqwest::Client::new(),
        );
        (server, validator)
    }

    fn sign(alg: Algorithm, kid: &str, key: &EncodingKey, claims: &serde_json::Value) -> String {
        let header = Header {
            kid: Some(kid.to_string()),
            ..Header::new(alg)
        };
        encode(&header, claims, key).unwrap()
    }

    #[tokio::test]
    async fn test_rs256_token() {
        let (_server, validator) = asymmetric_validator(RSA_JWKS).await;
        let key = EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM.as_bytes()).unwrap();

        let token = sign(Algorithm::RS256, "rsa-1", &key, &claims("alice", 300));
        let validated = validator.validate_jwt(&token).await.unwrap();
        assert_eq!(validated.principal_name, "alice");

        let mut tampered = claims("mallory", 300);
        tampered["scope"] = json!("admin");
        let forged = sign(Algorithm::HS256, "rsa-1", &EncodingKey::from_secret(SECRET), &tampered);
        assert!(matches!(
            validator.validate_jwt(&forged).await,
            Err(BridgeError::UnsupportedAlgorithm(_))
        ));
    }

    #[tokio::test]
    async fn test_es256_token() {
        let (_server, validator) = asymmetric_validator(EC_JWKS).await;
        let key = EncodingKey::from_ec_pem(EC_PRIVATE_PEM.as_bytes()).unwrap();

        let token = sign(Algorithm::ES256, "ec-1", &key, &claims("bob", 300));
        let validated = validator.validate_jwt(&token).await.unwrap();
        assert_eq!(validated.principal_name, "bob");
        assert_eq!(validated.scopes, vec!["profile", "kafka"]);
    }

    #[tokio::test]
    async fn test_rs256_signature_from_other_key_rejected() {
        // ES256 signature presented under the RSA key id
        let (_server, validator) = asymmetric_validator(RSA_JWKS).await;
        let key = EncodingKey::from_ec_pem(EC_PRIVATE_PEM.as_bytes()).unwrap();

        let token = sign(Algorithm::ES256, "rsa-1", &key, &claims("alice", 300));
        assert!(validator.validate_jwt(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_disallowed_algorithm() {
        let server = mockito::Server::new_async().await;
        let jwks_url = Url::parse(&format!("{}/certs", server.url())).unwrap();
        let validator = JwtValidator::with_http_client(
            JwtValidatorConfig::new(ISSUER, jwks_url),
            reqwest::Client::new(),
        );

        let result = validator.validate_jwt(&mint("k1", claims("alice", 300))).await;
        assert!(matches!(result, Err(BridgeError::UnsupportedAlgorithm(_))));
    }

    #[tokio::test]
    async fn test_malformed_token() {
        let server = mockito::Server::new_async().await;
        let validator = validator(&server);

        let result = validator.validate_jwt("not-a-jwt").await;
        assert!(matches!(result, Err(BridgeError::InvalidFormat(_))));
    }
}
