//! Blocking JSON client shared by the Google REST backends.

use crate::error::{DbError, DbResult};
use crate::google_auth::GoogleAuth;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("zangetsu-data/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Authorized HTTP client for one Google API
pub(crate) struct ApiClient {
    backend: &'static str,
    http: Client,
    auth: GoogleAuth,
}

impl ApiClient {
    pub fn new(backend: &'static str, auth: GoogleAuth) -> DbResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DbError::connection(backend, format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            backend,
            http,
            auth,
        })
    }

    /// Fetch a token now so credential problems surface at connect time.
    pub fn authorize(&self) -> DbResult<()> {
        self.auth.token(&self.http).map(|_| ())
    }

    pub fn client_email(&self) -> Option<&str> {
        self.auth.client_email()
    }

    pub fn get<T: DeserializeOwned>(&self, url: Url) -> DbResult<T> {
        self.execute(self.http.request(Method::GET, url))
    }

    pub fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &serde_json::Value,
    ) -> DbResult<T> {
        self.execute(self.http.request(method, url).json(body))
    }

    fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> DbResult<T> {
        let token = self.auth.token(&self.http)?;
        let response = request
            .bearer_auth(token)
            .send()
            .map_err(|e| DbError::connection(self.backend, e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| DbError::connection(self.backend, e))?;
        if !status.is_success() {
            return Err(DbError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| DbError::Api {
            status: status.as_u16(),
            message: format!("unexpected response body: {e}"),
        })
    }
}

/// Human-readable message of a Google API error body.
///
/// Falls back to the raw body when it is not the usual
/// `{"error": {"message": ...}}` envelope.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error }) if !error.message.is_empty() => match error.status {
            Some(status) => format!("{status}: {}", error.message),
            None => error.message,
        },
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => body.trim().to_string(),
    }
}

/// `root` with `segments` appended to its path, each percent-encoded.
pub(crate) fn api_url(root: &str, segments: &[&str]) -> DbResult<Url> {
    let mut url = Url::parse(root).map_err(|e| DbError::Api {
        status: 0,
        message: format!("invalid API root '{root}': {e}"),
    })?;
    url.path_segments_mut()
        .map_err(|_| DbError::Api {
            status: 0,
            message: format!("API root '{root}' cannot carry a path"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
