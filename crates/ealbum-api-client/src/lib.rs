//! Shared HTTP client for the eAlbum backend and storage APIs.
//!
//! Provides a minimal client with injectable credentials (Bearer token or X-API-Key),
//! generic GET/POST helpers, and domain methods for uploads and album creation.
//! Credentials are read from the provider on every request; the client never refreshes them.

pub mod api;

use anyhow::{Context, Result};
use ealbum_core::UploaderConfig;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Authentication strategy for the API.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Auth::XApiKey(_) => f.write_str("XApiKey(<redacted>)"),
        }
    }
}

/// Supplies credentials at request time.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Option<Auth>;
}

impl CredentialProvider for Auth {
    fn credentials(&self) -> Option<Auth> {
        Some(self.clone())
    }
}

/// Sends requests without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credentials(&self) -> Option<Auth> {
        None
    }
}

/// Credentials from a configured token, if any.
pub fn credentials_from_config(config: &UploaderConfig) -> Arc<dyn CredentialProvider> {
    match &config.api_token {
        Some(token) => Arc::new(Auth::Bearer(token.clone())),
        None => Arc::new(NoCredentials),
    }
}

/// Errors returned by API calls
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to send request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response as JSON: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ApiError {
    /// HTTP status of the failed call, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Decode(_) => None,
        }
    }

    /// Message reported by the server, or the local failure description
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// HTTP client for the eAlbum API with injectable credentials.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_prefix: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_prefix: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_prefix: api_prefix.into(),
            credentials,
        })
    }

    /// Client for the backend REST API (presigned URLs, multipart control, albums).
    pub fn backend(config: &UploaderConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.api_prefix(),
            credentials,
            config.request_timeout,
        )
    }

    /// Client for the storage API (bulk file ingest).
    pub fn storage(config: &UploaderConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        Self::new(
            config.storage_url.clone(),
            config.api_prefix(),
            credentials,
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.credentials() {
            Some(Auth::Bearer(token)) => request.header("Authorization", format!("Bearer {}", token)),
            Some(Auth::XApiKey(key)) => request.header("X-API-Key", key),
            None => request,
        }
    }

    /// Start an authenticated request against an API path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.build_url(path);
        self.apply_auth(self.client.request(method, url))
    }

    /// Send a request and deserialize its JSON response.
    pub async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        response.json().await.map_err(ApiError::Decode)
    }

    /// Send a request, discarding the response body.
    pub async fn execute_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await.map_err(ApiError::Request)?;
        error_for_status(response).await
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<T> {
        let mut request = self.request(Method::GET, path);
        if !query.is_empty() {
            request = request.query(query);
        }
        self.execute(request).await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.execute(self.request(Method::POST, path).json(body)).await
    }

    /// POST multipart form and deserialize response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> ApiResult<T> {
        self.execute(self.request(Method::POST, path).multipart(form))
            .await
    }

    /// Raw client for requests outside the API, such as PUTs to pre-signed URLs.
    /// No credentials are attached.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Turn a non-2xx response into [`ApiError::Status`], carrying the server's message.
pub async fn error_for_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(ApiError::Status {
        status: status.as_u16(),
        message: extract_error_message(&error_text)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string()),
    })
}

/// Pull a human-readable message out of an error body: `{"message": ..}`, `{"error": ..}`,
/// or the raw text.
fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for field in ["message", "error"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }

    Some(trimmed.to_string())
}
