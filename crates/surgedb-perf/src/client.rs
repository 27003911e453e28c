//! HTTP access to the service under test.
//!
//! Everything that talks to SurgeDB goes through [`HttpCaller`], so tests can
//! swap in scripted callers without a network.

use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Default per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method subset the harness needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// A single request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// JSON body (POST only)
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Status and raw body of a completed call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Client or server error status (>= 400).
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Issues one JSON request/response call.
///
/// Implementations return `Ok` for every response the server produced, whatever
/// its status, and `Err` only when no response was obtained.
#[async_trait]
pub trait HttpCaller: Send + Sync {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.call(HttpRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            body: Some(body),
            timeout,
        })
        .await
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.call(HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            body: None,
            timeout,
        })
        .await
    }

    async fn delete(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.call(HttpRequest {
            method: HttpMethod::Delete,
            url: url.to_string(),
            body: None,
            timeout,
        })
        .await
    }
}

/// [`HttpCaller`] backed by a pooled `reqwest::Client`.
///
/// One instance is shared by every worker of a run.
#[derive(Debug, Clone, Default)]
pub struct ReqwestCaller {
    client: reqwest::Client,
}

impl ReqwestCaller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpCaller for ReqwestCaller {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            body,
            timeout,
        } = request;

        let builder = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        let builder = match body {
            Some(body) => builder.json(&body),
            None => builder,
        };

        let response = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::new(&url, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(&url, e.to_string()))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Join a base URL and a path without doubling the slash.
#[must_use]
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
