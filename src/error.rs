//! The error type surfaced by every client call.
//!
//! Failures are represented by [`ApiError`]: a classified error kind from a
//! closed taxonomy, plus the HTTP status, structured payload, and message
//! when the failure carried them. Errors are constructed once by the
//! classifier and never mutated afterwards; they are `Clone` so a single
//! failed flight can deliver the same outcome to every deduplicated waiter.

use http::StatusCode;
use std::fmt;
use std::time::Duration;

/// The closed set of failure classifications.
///
/// Every error a call can produce carries exactly one of these kinds, so a
/// presentation layer can branch deterministically (redirect on
/// `Unauthorized`, render field errors on `Validation`, offer a retry on
/// `Network`/`Server`, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection-level failure: DNS, refused connection, reset, TLS.
    Network,
    /// The attempt exceeded its timeout (locally or via HTTP 408).
    Timeout,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 500, 502, 503, 504, or 429.
    Server,
    /// HTTP 400 or 422, optionally carrying field-level error details.
    Validation,
    /// Anything that does not fit the taxonomy.
    Unknown,
    /// The caller dropped the call mid-flight.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Server => "server",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The error type returned by all client operations.
///
/// # Examples
///
/// ```no_run
/// use steadfast::{Client, ErrorKind};
///
/// # async fn example() -> Result<(), steadfast::ApiError> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/reports/42").await {
///     Ok(response) => println!("{:?}", response.data),
///     Err(e) if e.kind == ErrorKind::Validation => {
///         eprintln!("field errors: {:?}", e.details);
///     }
///     Err(e) => eprintln!("{} ({:?})", e, e.status),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct ApiError {
    /// The classified failure kind.
    pub kind: ErrorKind,
    /// The HTTP status code, when the failure came from a response.
    pub status: Option<StatusCode>,
    /// Structured payload from the response body, when present.
    ///
    /// For `Validation` errors this carries the field-level error object
    /// verbatim so callers can render per-field messages.
    pub details: Option<serde_json::Value>,
    /// Human-readable description of the failure.
    pub message: String,
    /// Server-supplied wait hint, parsed from a `Retry-After` header.
    pub retry_after: Option<Duration>,
}

impl ApiError {
    /// Creates an error with the given kind and message and nothing else.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            details: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attaches an HTTP status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a structured response payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches a server-supplied retry-after hint.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// The error delivered when a call is dropped mid-flight.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request was cancelled")
    }

    /// Returns `true` if this failure is safe to retry for an idempotent
    /// request.
    ///
    /// Retryable failures are transport-level network and timeout errors,
    /// plus exactly the status codes 408, 429, 500, 502, 503, and 504.
    ///
    /// # Examples
    ///
    /// ```
    /// use steadfast::{ApiError, ErrorKind};
    /// use http::StatusCode;
    ///
    /// let err = ApiError::new(ErrorKind::Server, "upstream unavailable")
    ///     .with_status(StatusCode::SERVICE_UNAVAILABLE);
    /// assert!(err.is_retryable());
    ///
    /// let err = ApiError::new(ErrorKind::NotFound, "no such report")
    ///     .with_status(StatusCode::NOT_FOUND);
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Network | ErrorKind::Timeout => true,
            ErrorKind::Cancelled => false,
            _ => matches!(
                self.status.map(|s| s.as_u16()),
                Some(408 | 429 | 500 | 502 | 503 | 504)
            ),
        }
    }
}

/// A specialized `Result` type for client calls.
pub type Result<T> = std::result::Result<T, ApiError>;
