//! The client orchestrator: caching, deduplication, retries, and auth.
//!
//! [`Client`] is the main entry point. Use [`ClientBuilder`] to configure
//! and create clients.

use crate::{
    auth::TokenProvider,
    cache::ResponseCache,
    classify::{classify_status, classify_transport},
    dedup::{self, Deduplicator, Flight, FlightOutcome},
    descriptor::{RequestDescriptor, RequestOptions},
    error::{ApiError, ErrorKind},
    retry::RetryPolicy,
    transport::{HttpTransport, RawResponse, Transport, TransportRequest},
    Response, Result,
};
use http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A pure transform applied to the descriptor before dispatch.
///
/// Transforms run once per logical call, before the retry loop begins, so
/// every attempt sees the same transformed request.
pub type RequestTransform = Arc<dyn Fn(RequestDescriptor) -> RequestDescriptor + Send + Sync>;

/// A pure transform applied to the raw response of a successful exchange,
/// before deserialization.
pub type ResponseTransform = Arc<dyn Fn(RawResponse) -> RawResponse + Send + Sync>;

/// An HTTP client with response caching, in-flight deduplication, retry
/// with exponential backoff, and bearer-token refresh.
///
/// The client is cheap to clone and designed to be shared: the cache and
/// the dedup table live behind the clone, so every handle sees the same
/// state. All mutation of that shared state happens inside the request
/// path; nothing else writes to it.
///
/// # Examples
///
/// ```no_run
/// use steadfast::{Client, RetryPolicy};
/// use serde::Deserialize;
/// use std::time::Duration;
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
///     .timeout(Duration::from_secs(10))
///     .retry_policy(RetryPolicy::default())
///     .cache_ttl(Duration::from_secs(300))
///     .build()?;
///
/// // Served from the network once, then from cache for five minutes.
/// let user = client.get::<User>("/users/123").await?;
/// println!("{} (cached: {})", user.data.name, user.from_cache);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    timeout: Duration,
    cache: ResponseCache,
    dedup: Arc<Deduplicator>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    request_transforms: Vec<RequestTransform>,
    response_transforms: Vec<ResponseTransform>,
}

impl Client {
    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Makes a typed request described by the descriptor.
    ///
    /// This is the full-control entry point; the verb helpers all build a
    /// descriptor and delegate here. GETs consult the response cache
    /// (unless bypassed) and share one network flight per signature among
    /// concurrent callers. Failed attempts are retried per the configured
    /// [`RetryPolicy`]; an unauthorized attempt triggers at most one token
    /// refresh before the error surfaces.
    ///
    /// Dropping the returned future cancels the call: the in-flight
    /// transport attempt and any backoff wait are torn down, and any
    /// callers waiting on the same signature receive a `Cancelled` error.
    pub async fn request<T>(&self, descriptor: RequestDescriptor) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        if descriptor.path.is_empty() {
            return Err(ApiError::new(
                ErrorKind::Unknown,
                "request path must not be empty",
            ));
        }

        let start = Instant::now();

        let mut descriptor = descriptor;
        for transform in &self.inner.request_transforms {
            descriptor = transform(descriptor);
        }

        let signature = descriptor.signature();

        if descriptor.is_cacheable() {
            if let Some(raw) = self.inner.cache.get(&signature) {
                tracing::debug!(signature = %signature, "serving response from cache");
                return self.finish(raw, start, 0, true);
            }
        }

        if !descriptor.is_deduplicated() {
            let (outcome, attempts) = self.execute_with_retries(&descriptor).await;
            let raw = outcome?;
            return self.finish(raw, start, attempts, false);
        }

        match self.inner.dedup.join(&signature) {
            Flight::Follower(receiver) => {
                tracing::debug!(signature = %signature, "joining in-flight request");
                let raw = dedup::await_outcome(receiver).await?;
                self.finish(raw, start, 0, false)
            }
            Flight::Leader(guard) => {
                let (outcome, attempts) = self.execute_with_retries(&descriptor).await;
                if descriptor.is_cacheable() {
                    if let Ok(raw) = &outcome {
                        self.inner.cache.insert(&signature, raw.clone());
                    }
                }
                guard.settle(outcome.clone());
                let raw = outcome?;
                self.finish(raw, start, attempts, false)
            }
        }
    }

    /// Runs the retrying-call procedure: attempt, classify, refresh or
    /// back off, repeat. Returns the settled outcome and the number of
    /// network attempts made.
    async fn execute_with_retries(
        &self,
        descriptor: &RequestDescriptor,
    ) -> (FlightOutcome, usize) {
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            attempt += 1;

            let error = match self.execute_attempt(descriptor, attempt).await {
                Ok(raw) if raw.status.is_success() => {
                    let mut raw = raw;
                    for transform in &self.inner.response_transforms {
                        raw = transform(raw);
                    }
                    return (Ok(raw), attempt);
                }
                Ok(raw) => classify_status(raw.status, &raw.headers, &raw.body),
                Err(failure) => classify_transport(&failure),
            };

            tracing::warn!(
                error = %error,
                kind = %error.kind,
                attempt = attempt,
                method = %descriptor.method,
                path = %descriptor.path,
                "request attempt failed"
            );

            // One refresh-and-retry per logical call; a second 401 or a
            // failed refresh surfaces immediately.
            if error.kind == ErrorKind::Unauthorized && !refreshed {
                if let Some(provider) = &self.inner.token_provider {
                    refreshed = true;
                    match provider.refresh().await {
                        Ok(_) => {
                            tracing::info!("token refreshed, re-attempting request");
                            continue;
                        }
                        Err(refresh_error) => {
                            tracing::warn!(error = %refresh_error, "token refresh failed");
                            // A failed refresh always surfaces as
                            // unauthorized, whatever the provider reported.
                            let mut surfaced = refresh_error;
                            surfaced.kind = ErrorKind::Unauthorized;
                            return (Err(surfaced), attempt);
                        }
                    }
                }
            }

            if !self
                .inner
                .retry_policy
                .should_retry(&descriptor.method, &error, attempt)
            {
                return (Err(error), attempt);
            }

            let delay = self.inner.retry_policy.delay_for(attempt, &error);
            tracing::info!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                "retrying request after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Executes a single network attempt, auth header freshly injected.
    async fn execute_attempt(
        &self,
        descriptor: &RequestDescriptor,
        attempt: usize,
    ) -> std::result::Result<RawResponse, crate::transport::TransportError> {
        let mut url = self.inner.base_url.clone();
        url.set_path(&descriptor.path);
        for (key, value) in &descriptor.query_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        let mut headers = self.inner.default_headers.clone();
        for (name, value) in &descriptor.headers {
            headers.insert(name, value.clone());
        }

        // Token state may have changed since the last attempt, so the
        // header is injected per attempt rather than per call.
        if let Some(provider) = &self.inner.token_provider {
            if let Some(token) = provider.token().await {
                if let Ok(value) = HeaderValue::try_from(format!("Bearer {}", token.token)) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }

        tracing::debug!(
            method = %descriptor.method,
            url = %url,
            attempt = attempt,
            "executing HTTP request"
        );

        self.inner
            .transport
            .send(TransportRequest {
                method: descriptor.method.clone(),
                url,
                headers,
                body: descriptor.body.clone(),
                timeout: descriptor.timeout.unwrap_or(self.inner.timeout),
            })
            .await
    }

    /// Deserializes a raw success into the caller's type.
    fn finish<T>(
        &self,
        raw: RawResponse,
        start: Instant,
        attempts: usize,
        from_cache: bool,
    ) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let latency = start.elapsed();
        match serde_json::from_str::<T>(&raw.body) {
            Ok(data) => {
                tracing::info!(
                    status = raw.status.as_u16(),
                    latency_ms = latency.as_millis(),
                    attempts = attempts,
                    from_cache = from_cache,
                    "request completed"
                );
                Ok(Response {
                    data,
                    status: raw.status,
                    headers: raw.headers,
                    latency,
                    attempts,
                    from_cache,
                })
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw_body = %raw.body,
                    "failed to deserialize response"
                );
                Err(ApiError::new(
                    ErrorKind::Unknown,
                    format!("failed to deserialize response: {e}"),
                )
                .with_status(raw.status))
            }
        }
    }

    /// Makes a GET request to the specified path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use steadfast::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), steadfast::ApiError> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user = client.get::<User>("/users/123").await?;
    /// println!("{}", user.data.name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<T>(&self, path: impl Into<String>) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::new(Method::GET, path)).await
    }

    /// Makes a GET request with per-request options.
    pub async fn get_with<T>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::new(Method::GET, path).with_options(options))
            .await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<Req, T>(&self, path: impl Into<String>, body: &Req) -> Result<Response<T>>
    where
        Req: Serialize,
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::new(Method::POST, path).with_body(to_body(body)?))
            .await
    }

    /// Makes a POST request with a JSON body and per-request options.
    pub async fn post_with<Req, T>(
        &self,
        path: impl Into<String>,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Response<T>>
    where
        Req: Serialize,
        T: DeserializeOwned,
    {
        self.request(
            RequestDescriptor::new(Method::POST, path)
                .with_body(to_body(body)?)
                .with_options(options),
        )
        .await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<Req, T>(&self, path: impl Into<String>, body: &Req) -> Result<Response<T>>
    where
        Req: Serialize,
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::new(Method::PUT, path).with_body(to_body(body)?))
            .await
    }

    /// Makes a PUT request with a JSON body and per-request options.
    pub async fn put_with<Req, T>(
        &self,
        path: impl Into<String>,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Response<T>>
    where
        Req: Serialize,
        T: DeserializeOwned,
    {
        self.request(
            RequestDescriptor::new(Method::PUT, path)
                .with_body(to_body(body)?)
                .with_options(options),
        )
        .await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<Req, T>(&self, path: impl Into<String>, body: &Req) -> Result<Response<T>>
    where
        Req: Serialize,
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::new(Method::PATCH, path).with_body(to_body(body)?))
            .await
    }

    /// Makes a PATCH request with a JSON body and per-request options.
    pub async fn patch_with<Req, T>(
        &self,
        path: impl Into<String>,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Response<T>>
    where
        Req: Serialize,
        T: DeserializeOwned,
    {
        self.request(
            RequestDescriptor::new(Method::PATCH, path)
                .with_body(to_body(body)?)
                .with_options(options),
        )
        .await
    }

    /// Makes a DELETE request.
    pub async fn delete<T>(&self, path: impl Into<String>) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::new(Method::DELETE, path))
            .await
    }

    /// Makes a DELETE request with per-request options.
    pub async fn delete_with<T>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::new(Method::DELETE, path).with_options(options))
            .await
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Drops the cached response for one signature (see
    /// [`RequestDescriptor::signature`]).
    pub fn clear_cache_key(&self, signature: &str) {
        self.inner.cache.invalidate(signature);
    }
}

fn to_body<Req: Serialize>(body: &Req) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| {
        ApiError::new(
            ErrorKind::Unknown,
            format!("failed to serialize request body: {e}"),
        )
    })
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use steadfast::{ClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), steadfast::ApiError> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(10))
///     .retry_policy(RetryPolicy {
///         max_retries: 3,
///         base_delay: Duration::from_secs(1),
///         ..RetryPolicy::default()
///     })
///     .cache_ttl(Duration::from_secs(300))
///     .max_cache_entries(100)
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    timeout: Duration,
    cache_ttl: Duration,
    max_cache_entries: usize,
    token_provider: Option<Arc<dyn TokenProvider>>,
    transport: Option<Arc<dyn Transport>>,
    request_transforms: Vec<RequestTransform>,
    response_transforms: Vec<ResponseTransform>,
}

impl ClientBuilder {
    /// Creates a builder with the default configuration: 10 second
    /// timeout, 3 retries over a 1 second base delay, 5 minute cache TTL,
    /// and at most 100 cached entries.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::default(),
            timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
            max_cache_entries: 100,
            token_provider: None,
            transport: None,
            request_transforms: Vec::new(),
            response_transforms: Vec::new(),
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let parsed = Url::parse(url.as_ref()).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("invalid base URL: {e}"))
        })?;
        self.base_url = Some(parsed);
        Ok(self)
    }

    /// Adds a default header included in every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("invalid header name: {e}"))
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("invalid header value: {e}"))
        })?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry policy for failed GET attempts.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long cached GET responses stay fresh.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Bounds the number of cached responses. Inserting past the bound
    /// evicts the oldest-inserted entry.
    pub fn max_cache_entries(mut self, max: usize) -> Self {
        self.max_cache_entries = max;
        self
    }

    /// Sets the provider consulted for the bearer token and asked to
    /// refresh it after an unauthorized attempt.
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Replaces the default reqwest-backed transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Appends a request transform, run in registration order before
    /// dispatch.
    pub fn request_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(RequestDescriptor) -> RequestDescriptor + Send + Sync + 'static,
    {
        self.request_transforms.push(Arc::new(transform));
        self
    }

    /// Appends a response transform, run in registration order on each
    /// successful raw response before deserialization.
    pub fn response_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(RawResponse) -> RawResponse + Send + Sync + 'static,
    {
        self.response_transforms.push(Arc::new(transform));
        self
    }

    /// Builds the configured [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or the default
    /// transport cannot be constructed.
    pub fn build(self) -> Result<Client> {
        let base_url = self.base_url.ok_or_else(|| {
            ApiError::new(ErrorKind::Unknown, "base URL is required")
        })?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                default_headers: self.default_headers,
                retry_policy: self.retry_policy,
                timeout: self.timeout,
                cache: ResponseCache::new(self.cache_ttl, self.max_cache_entries),
                dedup: Arc::new(Deduplicator::new()),
                token_provider: self.token_provider,
                request_transforms: self.request_transforms,
                response_transforms: self.response_transforms,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
