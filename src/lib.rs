//! # Steadfast - a resilient HTTP API client
//!
//! Steadfast is a type-safe HTTP client core built on `reqwest` that takes
//! over the orchestration an application client normally reimplements by
//! hand: caching of successful GET responses, sharing one network call
//! among concurrent identical requests, retry with exponential backoff,
//! and bearer-token refresh on unauthorized responses.
//!
//! ## Quick Start
//!
//! ```no_run
//! use steadfast::{Client, RetryPolicy};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), steadfast::ApiError> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(10))
//!         .retry_policy(RetryPolicy {
//!             max_retries: 3,
//!             base_delay: Duration::from_secs(1),
//!             ..RetryPolicy::default()
//!         })
//!         .cache_ttl(Duration::from_secs(300))
//!         .build()?;
//!
//!     // First call hits the network; calls within the next five minutes
//!     // are served from the cache without a request.
//!     let user = client.get::<User>("/users/123").await?;
//!     println!("{} (cached: {})", user.data.name, user.from_cache);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## What the client does for you
//!
//! - **Response caching** - successful GETs are cached by a deterministic
//!   signature (method + path + sorted query params) with a TTL and a
//!   bounded entry count; `bypass_cache` skips it per request
//! - **Request deduplication** - concurrent GETs with the same signature
//!   share one in-flight network call and all receive the same outcome
//! - **Retry with backoff** - transient failures (network, timeout, 408,
//!   429, 500, 502, 503, 504) are retried for GETs with exponential
//!   backoff; `Retry-After` hints from the server are honored.
//!   Non-idempotent methods are never retried
//! - **Token lifecycle** - a [`TokenProvider`] injects the bearer token
//!   before every attempt and is asked to refresh exactly once when an
//!   attempt comes back 401
//! - **Classified errors** - every failure is an [`ApiError`] with one
//!   kind from a closed taxonomy, so callers can branch deterministically
//! - **Structured logging** - request, retry, and error events are emitted
//!   through `tracing`; without a subscriber this costs nothing
//!
//! ## Error handling
//!
//! ```no_run
//! use steadfast::{Client, ErrorKind};
//!
//! # async fn example() -> Result<(), steadfast::ApiError> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get::<serde_json::Value>("/endpoint").await {
//!     Ok(response) => println!("{:?}", response.data),
//!     Err(e) => match e.kind {
//!         ErrorKind::Unauthorized => eprintln!("session expired"),
//!         ErrorKind::Validation => eprintln!("field errors: {:?}", e.details),
//!         ErrorKind::Network | ErrorKind::Server => eprintln!("try again later"),
//!         _ => eprintln!("{e}"),
//!     },
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
mod cache;
pub mod classify;
mod client;
mod dedup;
mod descriptor;
mod error;
mod response;
pub mod retry;
pub mod transport;

pub use auth::{AuthToken, StaticTokenProvider, TokenProvider};
pub use client::{Client, ClientBuilder, RequestTransform, ResponseTransform};
pub use descriptor::{RequestDescriptor, RequestOptions};
pub use error::{ApiError, ErrorKind, Result};
pub use response::{Envelope, Response};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, RawResponse, Transport, TransportError, TransportRequest};
