//! Service-account credentials and OAuth access tokens for the sheet store.
//!
//! The key can come from two places, chosen once at startup:
//! - **[`InlineCredentials`]**: the whole JSON key in an environment variable
//!   (suits CI runners and container secrets).
//! - **[`FileCredentials`]**: a JSON key file on disk.
//!
//! [`ServiceAccountTokenSource`] turns a key into short-lived bearer tokens
//! using the OAuth 2.0 JWT bearer grant:
//!
//! 1. Sign an RS256 JWT (`iss` = client email, `aud` = token URI, `scope`).
//! 2. `POST` it to the token URI as `grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer`.
//! 3. Cache the returned `access_token` until one minute before it expires.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a Google service-account JSON key that token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).context("Invalid service account key JSON")?;
        if key.client_email.trim().is_empty() {
            bail!("service account key has an empty client_email");
        }
        if key.private_key.trim().is_empty() {
            bail!("service account key has an empty private_key");
        }
        Ok(key)
    }
}

/// A source of service-account key material.
pub trait CredentialProvider: Send + Sync {
    /// Human-readable description of where the key comes from.
    fn describe(&self) -> String;

    /// Load and parse the key.
    fn load(&self) -> Result<ServiceAccountKey>;
}

/// Key JSON held inline, typically from `GOOGLE_CREDENTIALS_JSON`.
pub struct InlineCredentials {
    json: String,
}

impl InlineCredentials {
    pub fn new(json: String) -> Self {
        Self { json }
    }
}

impl CredentialProvider for InlineCredentials {
    fn describe(&self) -> String {
        "inline JSON (GOOGLE_CREDENTIALS_JSON)".to_string()
    }

    fn load(&self) -> Result<ServiceAccountKey> {
        ServiceAccountKey::from_json(&self.json)
    }
}

/// Key JSON read from a file path.
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialProvider for FileCredentials {
    fn describe(&self) -> String {
        format!("key file {}", self.path.display())
    }

    fn load(&self) -> Result<ServiceAccountKey> {
        let path = self.path.display();
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read service account key: {}", path))?;
        ServiceAccountKey::from_json(&json)
    }
}

/// Supplies bearer tokens for store requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, for emulators and tests.
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: String,
    refresh_at: DateTime<Utc>,
}

/// Exchanges a signed service-account assertion for an OAuth access token.
pub struct ServiceAccountTokenSource {
    client: reqwest::Client,
    client_email: String,
    token_uri: String,
    scope: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    /// Build a token source; fails if the private key is not valid RSA PEM.
    pub fn new(client: reqwest::Client, key: ServiceAccountKey, scope: &str) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("service account private_key is not a valid RSA PEM key")?;
        Ok(Self {
            client,
            client_email: key.client_email,
            token_uri: key.token_uri,
            scope: scope.to_string(),
            signing_key,
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            iss: &self.client_email,
            scope: &self.scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .context("Failed to sign service account assertion")
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        let assertion = self.sign_assertion(now)?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token endpoint error {}: {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Invalid token endpoint response")?;
        tracing::debug!(expires_in = token.expires_in, "obtained access token");

        let lifetime = (token.expires_in - REFRESH_MARGIN_SECS).max(0);
        Ok(CachedToken {
            token: token.access_token,
            refresh_at: now + Duration::seconds(lifetime),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if now < token.refresh_at {
                return Ok(token.token.clone());
            }
        }
        let fresh = self.exchange(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
