//! Integration tests using wiremock to simulate HTTP servers.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use steadfast::{
    ApiError, AuthToken, Client, Envelope, ErrorKind, RequestDescriptor, RequestOptions,
    RetryPolicy, TokenProvider,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct TestData {
    id: u32,
    name: String,
}

fn sample() -> TestData {
    TestData {
        id: 1,
        name: "Test".to_string(),
    }
}

fn fast_retries(max_retries: usize) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_secs(1),
        jitter: false,
    }
}

async fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn successful_get_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.get::<TestData>("/test").await.unwrap();

    assert_eq!(response.data, sample());
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert!(!response.from_cache);
    assert!(!response.was_retried());
}

#[tokio::test]
async fn repeated_get_within_ttl_hits_the_network_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let first = client.get::<TestData>("/test").await.unwrap();
    let second = client.get::<TestData>("/test").await.unwrap();

    assert_eq!(first.data, second.data);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.attempts, 0);
}

#[tokio::test]
async fn cache_entries_expire_after_the_ttl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(2)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .cache_ttl(Duration::from_millis(50))
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap();

    let _ = client.get::<TestData>("/test").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = client.get::<TestData>("/test").await.unwrap();
    assert!(!second.from_cache);
}

#[tokio::test]
async fn bypass_cache_always_hits_the_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    // Prime the cache, then bypass it twice.
    let _ = client.get::<TestData>("/test").await.unwrap();
    for _ in 0..2 {
        let response = client
            .get_with::<TestData>("/test", RequestOptions::new().bypass_cache())
            .await
            .unwrap();
        assert!(!response.from_cache);
    }
}

#[tokio::test]
async fn clear_cache_key_forces_a_fresh_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let _ = client.get::<TestData>("/test").await.unwrap();

    let signature = RequestDescriptor::new(http::Method::GET, "/test").signature();
    client.clear_cache_key(&signature);

    let response = client.get::<TestData>("/test").await.unwrap();
    assert!(!response.from_cache);
}

#[tokio::test]
async fn clear_cache_drops_every_entry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(4)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let _ = client.get::<TestData>("/a").await.unwrap();
    let _ = client.get::<TestData>("/b").await.unwrap();
    client.clear_cache();
    assert!(!client.get::<TestData>("/a").await.unwrap().from_cache);
    assert!(!client.get::<TestData>("/b").await.unwrap().from_cache);
}

#[tokio::test]
async fn concurrent_gets_share_one_network_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&sample())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let (a, b, c) = tokio::join!(
        client.get::<TestData>("/slow"),
        client.get::<TestData>("/slow"),
        client.get::<TestData>("/slow"),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    let c = c.unwrap();
    assert_eq!(a.data, b.data);
    assert_eq!(b.data, c.data);
    // Followers never touched the network themselves.
    assert_eq!(a.attempts + b.attempts + c.attempts, 1);
}

#[tokio::test]
async fn concurrent_gets_share_the_same_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("boom")
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let (a, b) = tokio::join!(
        client.get::<TestData>("/broken"),
        client.get::<TestData>("/broken"),
    );

    let a = a.unwrap_err();
    let b = b.unwrap_err();
    assert_eq!(a.kind, ErrorKind::Server);
    assert_eq!(b.kind, ErrorKind::Server);
    assert_eq!(a.status, b.status);
}

#[tokio::test]
async fn gets_retry_with_exponential_backoff() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("GET"))
        .and(path("/unstable"))
        .respond_with(move |_req: &wiremock::Request| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(503).set_body_string("unavailable")
        })
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter: false,
        })
        .build()
        .unwrap();

    let start = Instant::now();
    let err = client.get::<TestData>("/unstable").await.unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Waits of 100ms then 200ms sit between the three attempts.
    assert!(elapsed >= Duration::from_millis(300), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn transient_failure_recovers_within_the_retry_budget() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(move |_req: &wiremock::Request| {
            if calls_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(502).set_body_string("bad gateway")
            } else {
                ResponseTemplate::new(200).set_body_json(&sample())
            }
        })
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(fast_retries(3))
        .build()
        .unwrap();

    let response = client.get::<TestData>("/flaky").await.unwrap();
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
}

#[tokio::test]
async fn non_idempotent_methods_never_retry() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(move |_req: &wiremock::Request| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(503).set_body_string("unavailable")
        })
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(fast_retries(3))
        .build()
        .unwrap();

    let err = client
        .post::<TestData, TestData>("/orders", &sample())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn posts_are_neither_cached_nor_deduplicated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&sample()))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let _ = client
        .post::<TestData, TestData>("/orders", &sample())
        .await
        .unwrap();
    let _ = client
        .post::<TestData, TestData>("/orders", &sample())
        .await
        .unwrap();
}

#[tokio::test]
async fn every_verb_reaches_the_right_route() {
    let server = MockServer::start().await;

    for verb in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
        Mock::given(method(verb))
            .and(path("/resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server).await;
    let body = sample();

    let _ = client.get::<TestData>("/resource").await.unwrap();
    let _ = client
        .post::<TestData, TestData>("/resource", &body)
        .await
        .unwrap();
    let _ = client
        .put::<TestData, TestData>("/resource", &body)
        .await
        .unwrap();
    let _ = client
        .patch::<TestData, TestData>("/resource", &body)
        .await
        .unwrap();
    let _ = client.delete::<TestData>("/resource").await.unwrap();
}

#[tokio::test]
async fn retry_after_hint_overrides_the_computed_backoff() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(move |_req: &wiremock::Request| {
            if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "1")
                    .set_body_string("rate limited")
            } else {
                ResponseTemplate::new(200).set_body_json(&sample())
            }
        })
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(fast_retries(2))
        .build()
        .unwrap();

    let start = Instant::now();
    let response = client.get::<TestData>("/limited").await.unwrap();

    assert_eq!(response.attempts, 2);
    // The 1s server hint wins over the 10ms computed delay.
    assert!(start.elapsed() >= Duration::from_millis(900));
}

struct RotatingProvider {
    token: Mutex<Option<String>>,
    refreshes: AtomicUsize,
    fail_refresh: bool,
}

impl RotatingProvider {
    fn new(initial: &str, fail_refresh: bool) -> Self {
        Self {
            token: Mutex::new(Some(initial.to_string())),
            refreshes: AtomicUsize::new(0),
            fail_refresh,
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for RotatingProvider {
    async fn token(&self) -> Option<AuthToken> {
        self.token.lock().unwrap().clone().map(AuthToken::new)
    }

    async fn refresh(&self) -> steadfast::Result<AuthToken> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh {
            self.token.lock().unwrap().take();
            return Err(ApiError::new(
                ErrorKind::Unauthorized,
                "refresh rejected",
            ));
        }
        *self.token.lock().unwrap() = Some("fresh-token".to_string());
        Ok(AuthToken::new("fresh-token"))
    }
}

#[tokio::test]
async fn bearer_token_is_injected_into_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(RetryPolicy::none())
        .token_provider(Arc::new(RotatingProvider::new("stale-token", false)))
        .build()
        .unwrap();

    let _ = client.get::<TestData>("/me").await.unwrap();
}

#[tokio::test]
async fn unauthorized_triggers_one_refresh_and_one_reattempt() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(move |req: &wiremock::Request| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let authorized = req
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(|v| v == "Bearer fresh-token")
                .unwrap_or(false);
            if authorized {
                ResponseTemplate::new(200).set_body_json(&sample())
            } else {
                ResponseTemplate::new(401).set_body_string("expired")
            }
        })
        .mount(&server)
        .await;

    let provider = Arc::new(RotatingProvider::new("stale-token", false));
    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(fast_retries(3))
        .token_provider(provider.clone())
        .build()
        .unwrap();

    let response = client.get::<TestData>("/me").await.unwrap();

    assert_eq!(response.data, sample());
    assert_eq!(response.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_refresh_surfaces_unauthorized_without_a_reattempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(RotatingProvider::new("stale-token", true));
    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(fast_retries(3))
        .token_provider(provider.clone())
        .build()
        .unwrap();

    let err = client.get::<TestData>("/me").await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
    assert!(provider.token().await.is_none());
}

struct UnreachableRefreshProvider;

#[async_trait::async_trait]
impl TokenProvider for UnreachableRefreshProvider {
    async fn token(&self) -> Option<AuthToken> {
        Some(AuthToken::new("stale-token"))
    }

    async fn refresh(&self) -> steadfast::Result<AuthToken> {
        Err(ApiError::new(
            ErrorKind::Network,
            "token endpoint unreachable",
        ))
    }
}

#[tokio::test]
async fn refresh_failure_is_reported_as_unauthorized_whatever_the_provider_says() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(fast_retries(3))
        .token_provider(Arc::new(UnreachableRefreshProvider))
        .build()
        .unwrap();

    let err = client.get::<TestData>("/me").await.unwrap_err();

    // The provider reported a network failure, but the caller sees the
    // auth problem; the provider's message is kept.
    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert_eq!(err.message, "token endpoint unreachable");
}

#[tokio::test]
async fn second_unauthorized_surfaces_without_another_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(2)
        .mount(&server)
        .await;

    let provider = Arc::new(RotatingProvider::new("stale-token", false));
    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(fast_retries(3))
        .token_provider(provider.clone())
        .build()
        .unwrap();

    let err = client.get::<TestData>("/me").await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_leader_releases_waiting_followers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&sample())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let leader_client = client.clone();
    let leader = tokio::spawn(async move { leader_client.get::<TestData>("/slow").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let follower_client = client.clone();
    let follower = tokio::spawn(async move { follower_client.get::<TestData>("/slow").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    leader.abort();

    let err = follower.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
}

#[tokio::test]
async fn per_attempt_timeout_classifies_as_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&sample())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .get_with::<TestData>(
            "/slow",
            RequestOptions::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn validation_errors_carry_field_details() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "message": "invalid input",
            "errors": { "email": "must be valid" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .post::<TestData, TestData>("/users", &sample())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.status.map(|s| s.as_u16()), Some(422));
    assert_eq!(err.details.unwrap()["errors"]["email"], "must be valid");
}

#[tokio::test]
async fn http_errors_classify_by_status() {
    let server = MockServer::start().await;
    for (route, status) in [("/forbidden", 403u16), ("/missing", 404), ("/teapot", 418)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let client = client_for(&server).await;

    let err = client.get::<TestData>("/forbidden").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let err = client.get::<TestData>("/missing").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = client.get::<TestData>("/teapot").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unknown);
}

#[tokio::test]
async fn connection_failure_classifies_as_network() {
    // Nothing is listening on this port.
    let client = Client::builder()
        .base_url("http://127.0.0.1:9")
        .unwrap()
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap();

    let err = client.get::<TestData>("/test").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
}

#[tokio::test]
async fn unparseable_success_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get::<TestData>("/test").await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    assert_eq!(err.status.map(|s| s.as_u16()), Some(200));
}

#[tokio::test]
async fn empty_path_is_rejected_before_dispatch() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    let err = client.get::<TestData>("").await.unwrap_err();
    assert!(err.message.contains("path"));
}

#[tokio::test]
async fn envelope_payloads_deserialize() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wrapped"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": { "id": 1, "name": "Test" },
            "message": "ok"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.get::<Envelope<TestData>>("/wrapped").await.unwrap();

    assert!(response.data.success);
    assert_eq!(response.data.data, sample());
    assert_eq!(response.data.message.as_deref(), Some("ok"));
}

#[tokio::test]
async fn query_params_and_default_headers_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(wiremock::matchers::query_param("page", "2"))
        .and(header("user-agent", "steadfast-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(RetryPolicy::none())
        .default_header("User-Agent", "steadfast-test")
        .unwrap()
        .build()
        .unwrap();

    let _ = client
        .get_with::<TestData>("/search", RequestOptions::new().param("page", "2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn transforms_run_before_dispatch_and_after_receipt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("x-trace", "injected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sample()))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(RetryPolicy::none())
        .request_transform(|descriptor| {
            descriptor
                .with_header("x-trace", "injected")
                .expect("static header is valid")
        })
        .response_transform(|mut raw| {
            raw.body = raw.body.replace("Test", "Transformed");
            raw
        })
        .build()
        .unwrap();

    let response = client.get::<TestData>("/test").await.unwrap();
    assert_eq!(response.data.name, "Transformed");
}
