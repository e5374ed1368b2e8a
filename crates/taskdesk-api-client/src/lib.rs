//! Shared HTTP client for the taskdesk REST backend.
//!
//! A minimal client authenticated with `X-API-Key`, a JSON POST helper, and
//! the domain methods the upload core needs. `ApiClient` implements the
//! `ResourceApi` and `MetadataApi` capabilities from `taskdesk_core`.

pub mod api;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use taskdesk_core::constants::DEFAULT_API_VERSION;
use taskdesk_core::UploadConfig;

/// A non-success HTTP response. Carried inside `anyhow::Error` so callers can
/// recover the status with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("API request failed with status {status}: {body}")]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

/// HTTP client for the taskdesk API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_version: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key,
        })
    }

    /// Set the API version used in the `/api/{version}` prefix.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Create client from an already loaded configuration.
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Missing API key. Set TASKDESK_API_KEY or API_KEY")?;

        Ok(Self::new(config.api_url.clone(), api_key)?
            .with_api_version(config.api_version.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// API version prefix (e.g. "/api/v1").
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("X-API-Key", self.api_key.as_str())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(HttpStatusError {
            status: status.as_u16(),
            body,
        }
        .into())
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path);
        let request = self.client.post(&url).json(body);
        let request = self.apply_auth(request);

        let response = request.send().await.context("Failed to send request")?;
        let response = Self::check_status(response).await?;

        // Some endpoints answer 201/204 with an empty body.
        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?;
        let raw: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        let body: T = serde_json::from_slice(raw).context("Failed to parse response as JSON")?;

        Ok(body)
    }
}

/// HTTP status carried by an error returned from this client, if any.
pub fn status_of(err: &anyhow::Error) -> Option<u16> {
    err.downcast_ref::<HttpStatusError>().map(|e| e.status)
}
