//! The transport seam between the orchestrator and the wire.
//!
//! The client never touches `reqwest` directly; it talks to a [`Transport`],
//! which performs exactly one network exchange per call. [`HttpTransport`]
//! is the production implementation; tests substitute their own to script
//! outcomes and count invocations.

use crate::error::{ApiError, ErrorKind};
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use url::Url;

/// Everything needed for one network attempt.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The fully resolved URL, query parameters included.
    pub url: Url,
    /// Headers for this attempt, auth header already injected.
    pub headers: HeaderMap,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
    /// The timeout for this single attempt.
    pub timeout: Duration,
}

/// A raw HTTP response, before any classification or deserialization.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body as text.
    pub body: String,
}

/// A failure below the HTTP layer: no response was received.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The attempt exceeded its timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection-level failure (DNS, refused, reset, TLS).
    #[error("network failure: {0}")]
    Network(String),
}

/// Performs a single network exchange.
///
/// Implementations must not retry, cache, or otherwise orchestrate; that is
/// the client's job. One call to [`send`](Transport::send) is one attempt
/// on the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the raw response, or a transport-level
    /// failure if no response was received.
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError>;
}

/// The production [`Transport`], backed by a pooled `reqwest` client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a fresh connection pool.
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            ApiError::new(
                ErrorKind::Unknown,
                format!("failed to build HTTP client: {e}"),
            )
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();

        // Body reads share the attempt timeout through reqwest; a failure
        // here still counts as a transport failure, not an HTTP error.
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
