//! JSON-over-HTTP client shared by both store implementations
//!
//! Wraps a `reqwest::Client` bound to one base URL. Responses are decoded
//! into typed schemas at this boundary; anything that does not fit becomes
//! an `ApiError` instead of a runtime type failure further in.

use std::time::Duration;

use reqwest::{IntoUrl, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::log_debug;
use crate::logging::SharedLogger;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while talking to a store API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Connection failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// How a request authenticates
#[derive(Clone, Copy)]
pub enum ApiAuth<'a> {
    None,
    /// `X-Vault-Token` header
    VaultToken(&'a str),
    /// `Authorization: Bearer` header
    Bearer(&'a str),
}

/// Error bodies of both APIs: Vault sends `errors`, `bw serve` sends `message`
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client bound to a base URL
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    logger: SharedLogger,
}

impl ApiClient {
    /// Create a client with the default timeout
    pub fn new(base_url: impl Into<String>, logger: SharedLogger) -> ApiResult<Self> {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(base_url, http, logger))
    }

    /// Create from an existing `reqwest::Client`
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client, logger: SharedLogger) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http,
            logger,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL of `segments` below the base URL.
    ///
    /// Each segment is percent-encoded on its own, so `/`, `?` and `#` inside
    /// a name stay part of that segment.
    pub fn endpoint<I>(&self, segments: I) -> ApiResult<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request to a fixed path with authentication applied
    pub fn request(&self, method: Method, path: &str, auth: ApiAuth<'_>) -> RequestBuilder {
        self.request_to(method, self.url(path), auth)
    }

    /// Start a request to a prepared URL, see [`ApiClient::endpoint`]
    pub fn request_to(&self, method: Method, url: impl IntoUrl, auth: ApiAuth<'_>) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match auth {
            ApiAuth::None => builder,
            ApiAuth::VaultToken(token) => builder.header("X-Vault-Token", token),
            ApiAuth::Bearer(token) => builder.bearer_auth(token),
        }
    }

    /// Send and decode a JSON body
    pub async fn send_json<R: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<R> {
        let body = self.send_raw(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("{} (body: {})", e, truncate(&body, 200)))
        })
    }

    /// Send and only check the status
    pub async fn send_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        self.send_raw(request).await.map(|_| ())
    }

    async fn send_raw(&self, request: RequestBuilder) -> ApiResult<String> {
        let request = request.build()?;
        let method = request.method().clone();
        // Only the path is logged; query strings may carry search terms.
        let path = request.url().path().to_string();
        log_debug!(self.logger, "{} {}", method, path);

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        log_debug!(self.logger, "{} {} -> {}", method, path, status.as_u16());

        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            })
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if !parsed.errors.is_empty() {
        return parsed.errors.join("; ");
    }
    if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
        return message;
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        truncate(body, 200).to_string()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
