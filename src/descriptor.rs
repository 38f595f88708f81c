//! Request descriptors and per-request options.
//!
//! A [`RequestDescriptor`] is the immutable value describing one logical
//! call. Its [`signature`](RequestDescriptor::signature) is the key used
//! for response caching and in-flight deduplication.

use crate::error::{ApiError, ErrorKind};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::time::Duration;

/// Describes a single logical HTTP call.
///
/// Descriptors are built once and never mutated by the client; the retry
/// loop sees the same descriptor on every attempt.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path (relative to the base URL).
    pub path: String,

    /// Query parameters, in insertion order. Order does not affect the
    /// signature.
    pub query_params: Vec<(String, String)>,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Optional JSON request body. Excluded from the signature.
    pub body: Option<serde_json::Value>,

    /// Per-request timeout; the client's default applies when absent.
    pub timeout: Option<Duration>,

    /// When `true`, a GET skips the response cache entirely.
    pub bypass_cache: bool,
}

impl RequestDescriptor {
    /// Creates a descriptor with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query_params: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            bypass_cache: false,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> crate::Result<Self> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("invalid header name: {e}"))
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("invalid header value: {e}"))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Sets the JSON request body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a per-request timeout, overriding the client default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks this request to skip the response cache.
    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    /// Merges per-request options into this descriptor.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        for (name, value) in options.headers {
            self.headers.insert(name, value);
        }
        self.query_params.extend(options.params);
        if options.timeout.is_some() {
            self.timeout = options.timeout;
        }
        if options.bypass_cache {
            self.bypass_cache = true;
        }
        self
    }

    /// Computes the deterministic cache/dedup key for this request.
    ///
    /// The signature covers method, path, and query parameters sorted by
    /// key then value. Body and headers are excluded; only GET responses
    /// are cached or deduplicated, so two GETs for the same address always
    /// collide regardless of parameter insertion order.
    ///
    /// # Examples
    ///
    /// ```
    /// use steadfast::RequestDescriptor;
    /// use http::Method;
    ///
    /// let a = RequestDescriptor::new(Method::GET, "/reports")
    ///     .with_query_param("page", "1")
    ///     .with_query_param("limit", "10");
    /// let b = RequestDescriptor::new(Method::GET, "/reports")
    ///     .with_query_param("limit", "10")
    ///     .with_query_param("page", "1");
    ///
    /// assert_eq!(a.signature(), b.signature());
    /// ```
    pub fn signature(&self) -> String {
        let mut params = self.query_params.clone();
        params.sort();

        let mut signature = format!("{} {}", self.method, self.path);
        for (i, (key, value)) in params.iter().enumerate() {
            signature.push(if i == 0 { '?' } else { '&' });
            signature.push_str(key);
            signature.push('=');
            signature.push_str(value);
        }
        signature
    }

    /// Returns `true` if responses to this request may be served from and
    /// stored in the cache.
    pub(crate) fn is_cacheable(&self) -> bool {
        self.method == Method::GET && !self.bypass_cache
    }

    /// Returns `true` if this request shares one in-flight call per
    /// signature.
    pub(crate) fn is_deduplicated(&self) -> bool {
        self.method == Method::GET
    }
}

/// Per-request overrides accepted by the verb helpers.
///
/// # Examples
///
/// ```
/// use steadfast::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .param("page", "2")
///     .timeout(Duration::from_secs(5))
///     .bypass_cache();
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Vec<(HeaderName, HeaderValue)>,
    params: Vec<(String, String)>,
    timeout: Option<Duration>,
    bypass_cache: bool,
}

impl RequestOptions {
    /// Creates an empty set of options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header. Invalid names or values are silently dropped; use
    /// [`RequestDescriptor::with_header`] for fallible construction.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.push((name, value));
        }
        self
    }

    /// Adds a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Overrides the client's default timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skips the response cache for this request.
    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}
