// ABOUTME: HTTP transport to upstream model providers
// ABOUTME: Sends encoded request bodies and returns response text or a raw byte stream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Upstream Transport
//!
//! The transport knows nothing about dialects: it posts a JSON body to a
//! model's endpoint and hands back either the full response text or the raw
//! byte stream. Non-success statuses become `UpstreamRejected` carrying the
//! provider's diagnostic text; timeouts become `UpstreamTimeout`.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use super::openai_compatible::parse_error_message;
use crate::config::environment::UpstreamConfig;
use crate::constants::upstream::DIAGNOSTIC_PREVIEW_CHARS;
use crate::errors::{AppError, AppResult};
use crate::models::ModelConfig;

/// Raw upstream byte stream
pub type ByteStream = Pin<Box<dyn Stream<Item = AppResult<Bytes>> + Send>>;

/// One outbound call to a provider
#[derive(Clone)]
pub struct UpstreamRequest {
    /// Provider tag, used in error messages and logs
    pub provider: String,
    /// Endpoint URL
    pub endpoint: String,
    /// Bearer credential, empty for none
    pub credential: String,
    /// Encoded request body
    pub body: Value,
}

impl UpstreamRequest {
    /// Build a call to the endpoint of a resolved model
    #[must_use]
    pub fn for_model(model: &ModelConfig, body: Value) -> Self {
        Self {
            provider: model.provider_tag.clone(),
            endpoint: model.api_endpoint.clone(),
            credential: model.credential.clone(),
            body,
        }
    }
}

impl fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamRequest")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("body", &self.body)
            .finish()
    }
}

/// Sends encoded bodies to upstream providers
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Send a request and return the full response body
    async fn send_json(&self, request: UpstreamRequest) -> AppResult<String>;

    /// Send a request and return the response body as a byte stream
    async fn send_stream(&self, request: UpstreamRequest) -> AppResult<ByteStream>;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    request_timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport with the configured connect and request bounds
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    fn prepare(&self, request: &UpstreamRequest) -> RequestBuilder {
        let builder = self
            .client
            .post(&request.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&request.body);
        if request.credential.is_empty() {
            builder
        } else {
            builder.bearer_auth(&request.credential)
        }
    }

    async fn ensure_success(provider: &str, response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(provider, status = status.as_u16(), "Upstream rejected request");
        Err(AppError::upstream_rejected(
            provider,
            status.as_u16(),
            diagnostic_text(&body),
        ))
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn send_json(&self, request: UpstreamRequest) -> AppResult<String> {
        debug!(
            provider = %request.provider,
            endpoint = %request.endpoint,
            "Sending completion request"
        );
        let response = self
            .prepare(&request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(&request.provider, e))?;

        let response = Self::ensure_success(&request.provider, response).await?;
        response
            .text()
            .await
            .map_err(|e| AppError::from_reqwest(&request.provider, e))
    }

    async fn send_stream(&self, request: UpstreamRequest) -> AppResult<ByteStream> {
        debug!(
            provider = %request.provider,
            endpoint = %request.endpoint,
            "Opening completion stream"
        );
        let response = self
            .prepare(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(&request.provider, e))?;

        let response = Self::ensure_success(&request.provider, response).await?;
        let provider = request.provider;
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| AppError::from_reqwest(&provider, e)));
        Ok(Box::pin(stream))
    }
}

/// Provider diagnostic for an error body: its JSON error message, or a prefix of the raw text
#[must_use]
pub fn diagnostic_text(body: &str) -> String {
    parse_error_message(body)
        .unwrap_or_else(|| body.trim().chars().take(DIAGNOSTIC_PREVIEW_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_text_prefers_json_message() {
        assert_eq!(
            diagnostic_text(r#"{"error":{"message":"Insufficient Balance"}}"#),
            "Insufficient Balance"
        );
        let long = "x".repeat(500);
        assert_eq!(diagnostic_text(&long).len(), DIAGNOSTIC_PREVIEW_CHARS);
    }
}
