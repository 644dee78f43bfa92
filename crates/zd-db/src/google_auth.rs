//! OAuth2 access tokens for Google APIs.
//!
//! Either a pre-issued access token is used as-is, or a service-account key
//! signs an RS256 JWT assertion that is exchanged at the key's `token_uri`.
//! Exchanged tokens are reused until shortly before they expire.

use crate::error::{DbError, DbResult};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// OAuth scope for BigQuery.
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// OAuth scope for Google Sheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion.
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account key file that token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"****")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Debug)]
enum Credentials {
    AccessToken(String),
    ServiceAccount(ServiceAccountKey),
}

/// Source of bearer tokens for one Google API scope
#[derive(Debug)]
pub struct GoogleAuth {
    credentials: Credentials,
    scope: String,
    cached: RefCell<Option<CachedToken>>,
}

impl GoogleAuth {
    /// Use a pre-issued token for every request.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::AccessToken(token.into()),
            scope: String::new(),
            cached: RefCell::new(None),
        }
    }

    pub fn from_service_account(key: ServiceAccountKey, scope: &str) -> Self {
        Self {
            credentials: Credentials::ServiceAccount(key),
            scope: scope.to_string(),
            cached: RefCell::new(None),
        }
    }

    /// Parse a service-account key from its JSON text.
    pub fn from_service_account_json(json: &str, scope: &str) -> DbResult<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| DbError::Auth(format!("invalid service account key: {e}")))?;
        Ok(Self::from_service_account(key, scope))
    }

    /// Read a service-account key file.
    pub fn from_service_account_file(path: &Path, scope: &str) -> DbResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DbError::Auth(format!(
                "cannot read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_service_account_json(&json, scope)
    }

    /// Pick a credential source: an explicit token wins over a key file.
    pub fn resolve(
        credentials_path: Option<&Path>,
        access_token: Option<&str>,
        scope: &str,
    ) -> DbResult<Self> {
        match (access_token, credentials_path) {
            (Some(token), _) => Ok(Self::from_access_token(token)),
            (None, Some(path)) => Self::from_service_account_file(path, scope),
            (None, None) => Err(DbError::Auth(
                "no credentials configured; set credentials_path or access_token".to_string(),
            )),
        }
    }

    /// Service-account email, when a key file is in use.
    pub fn client_email(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::ServiceAccount(key) => Some(&key.client_email),
            Credentials::AccessToken(_) => None,
        }
    }

    /// A bearer token valid for at least [`EXPIRY_MARGIN`].
    pub fn token(&self, client: &Client) -> DbResult<String> {
        let key = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => key,
        };

        if let Some(cached) = self.cached.borrow().as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let assertion = self.assertion(key, unix_now())?;
        log::debug!(
            "Exchanging service account assertion for {} at {}",
            key.client_email,
            key.token_uri
        );
        let response = client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|e| DbError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DbError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .map_err(|e| DbError::Auth(format!("invalid token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
        *self.cached.borrow_mut() = Some(CachedToken {
            token: token.access_token.clone(),
            refresh_at,
        });
        Ok(token.access_token)
    }

    /// Signed JWT bearer assertion issued at `now` (seconds since the epoch).
    pub(crate) fn assertion(&self, key: &ServiceAccountKey, now: u64) -> DbResult<String> {
        let claims = Claims {
            iss: key.client_email.clone(),
            scope: self.scope.clone(),
            aud: key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DbError::Auth(format!("invalid private key: {e}")))?;
        jsonwebtoken::encode(&header, &claims, &signing_key)
            .map_err(|e| DbError::Auth(format!("failed to sign assertion: {e}")))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "google_auth_test.rs"]
mod tests;
