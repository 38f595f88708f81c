//! Typed response wrapper and the optional wire envelope.

use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// A successful call's deserialized data plus transaction metadata.
///
/// # Examples
///
/// ```no_run
/// use steadfast::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), steadfast::ApiError> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.get::<User>("/users/123").await?;
/// println!("{} ({:?}, cached: {})", response.data.name, response.latency, response.from_cache);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The HTTP status code of the response that produced the data.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Total time spent on this call, across all attempts. Near zero for
    /// cache hits.
    pub latency: Duration,

    /// Network attempts made for this call. `0` means the response came
    /// straight from the cache or from another caller's in-flight request.
    pub attempts: usize,

    /// Whether the response was served from the cache.
    pub from_cache: bool,
}

impl<T> Response<T> {
    /// Transforms the data while keeping the metadata.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
            from_cache: self.from_cache,
        }
    }

    /// Returns `true` if the call needed more than one network attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// The `{ success, data, message? }` envelope some APIs wrap payloads in.
///
/// The client deserializes into whatever type the caller asks for; APIs
/// that use this envelope can ask for `Envelope<T>` and unwrap it.
///
/// # Examples
///
/// ```
/// use steadfast::Envelope;
///
/// let body = r#"{"success":true,"data":{"id":7},"message":"ok"}"#;
/// let envelope: Envelope<serde_json::Value> = serde_json::from_str(body).unwrap();
/// assert!(envelope.success);
/// assert_eq!(envelope.data["id"], 7);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Whether the server reports the operation as successful.
    pub success: bool,
    /// The wrapped payload.
    pub data: T,
    /// Optional human-readable note from the server.
    #[serde(default)]
    pub message: Option<String>,
}
