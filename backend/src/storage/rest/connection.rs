use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::{Method, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use shared::ApiErrorResponse;
use std::time::Duration;

use crate::config::ConsoleConfig;
use crate::storage::{ApiError, ApiResult};

/// HTTP connection to the remote console API.
///
/// Every call is a single attempt. Non-2xx responses become
/// `ApiError::Rejected` carrying the server's error message, 404 becomes
/// `ApiError::NotFound`.
#[derive(Clone)]
pub struct RestConnection {
    client: reqwest::Client,
    base: Url,
}

impl RestConnection {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let base = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid API base URL '{}'", base_url))?;
        if base.cannot_be_a_base() {
            bail!("API base URL '{}' cannot carry a path", base_url);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base })
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// `{base}/api/{segments...}`; each segment is percent-encoded on its own
    pub(crate) fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("invalid API base URL {}", self.base)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        Self::read_json(response).await
    }

    pub(crate) async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> ApiResult<T> {
        let response = self.send(method, url, Some(body)).await?;
        Self::read_json(response).await
    }

    /// Send a request whose response body is ignored
    pub(crate) async fn send_command<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> ApiResult<()> {
        self.send(method, url, body).await.map(|_| ())
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> ApiResult<Response> {
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn error_from_response(response: Response) -> ApiError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return ApiError::NotFound;
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&body);
        if message.is_empty() {
            debug!("Unstructured error body for status {}: {}", status, body.trim());
        }
        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// Message of a structured error payload. Anything else (proxy pages, plain
/// text) yields an empty message so callers use their own wording.
pub(crate) fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .map(|payload| payload.error.trim().to_string())
        .unwrap_or_default()
}
