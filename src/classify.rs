//! Classification of raw transport outcomes into [`ApiError`] values.
//!
//! These functions are pure and deterministic: the same status, headers,
//! and body always produce the same error. All error construction funnels
//! through here so the taxonomy stays closed.

use crate::error::{ApiError, ErrorKind};
use crate::transport::TransportError;
use http::{HeaderMap, StatusCode};
use std::time::{Duration, SystemTime};

/// Maps a non-success HTTP response to an [`ApiError`].
///
/// Mapping: 401 → `Unauthorized`, 403 → `Forbidden`, 404 → `NotFound`,
/// 400/422 → `Validation` (carrying the body's JSON payload when it parses),
/// 408 → `Timeout`, 429 and 500/502/503/504 → `Server`, anything else →
/// `Unknown`. A `Retry-After` header on the response is recorded as a wait
/// hint.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ApiError {
    let kind = match status.as_u16() {
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        400 | 422 => ErrorKind::Validation,
        408 => ErrorKind::Timeout,
        429 | 500 | 502 | 503 | 504 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    };

    let parsed_body = serde_json::from_str::<serde_json::Value>(body).ok();

    let message = parsed_body
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| {
            format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("error")
            )
        });

    let mut err = ApiError::new(kind, message).with_status(status);

    // Validation responses keep their payload verbatim so callers can
    // render per-field messages.
    if kind == ErrorKind::Validation {
        if let Some(details) = parsed_body {
            err = err.with_details(details);
        }
    }

    if let Some(delay) = parse_retry_after(headers) {
        err = err.with_retry_after(delay);
    }

    err
}

/// Maps a transport-level failure (no HTTP response) to an [`ApiError`].
pub fn classify_transport(failure: &TransportError) -> ApiError {
    match failure {
        TransportError::Timeout => {
            ApiError::new(ErrorKind::Timeout, "request exceeded its timeout")
        }
        TransportError::Network(detail) => {
            ApiError::new(ErrorKind::Network, format!("network failure: {detail}"))
        }
    }
}

/// Parses the `Retry-After` header in both delay-seconds and HTTP-date form.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date_time) = httpdate::parse_http_date(header) {
        if let Ok(duration) = date_time.duration_since(SystemTime::now()) {
            return Some(duration);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn classify(code: u16) -> ApiError {
        classify_status(
            StatusCode::from_u16(code).unwrap(),
            &HeaderMap::new(),
            "",
        )
    }

    #[test]
    fn status_mapping_is_complete() {
        let cases = [
            (400u16, ErrorKind::Validation),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (408, ErrorKind::Timeout),
            (422, ErrorKind::Validation),
            (429, ErrorKind::Server),
            (500, ErrorKind::Server),
            (502, ErrorKind::Server),
            (503, ErrorKind::Server),
            (504, ErrorKind::Server),
        ];
        for (code, expected) in cases {
            let err = classify(code);
            assert_eq!(err.kind, expected, "status {code}");
            assert_eq!(err.status.map(|s| s.as_u16()), Some(code));
        }
    }

    #[test]
    fn unrecognized_status_maps_to_unknown() {
        assert_eq!(classify(418).kind, ErrorKind::Unknown);
        assert_eq!(classify(501).kind, ErrorKind::Unknown);
    }

    #[test]
    fn validation_errors_carry_the_payload_verbatim() {
        let body = r#"{"message":"invalid input","errors":{"email":"must be valid"}}"#;
        let err = classify_status(StatusCode::UNPROCESSABLE_ENTITY, &HeaderMap::new(), body);
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, "invalid input");
        let details = err.details.unwrap();
        assert_eq!(details["errors"]["email"], "must be valid");
    }

    #[test]
    fn non_validation_errors_do_not_carry_details() {
        let body = r#"{"message":"nope"}"#;
        let err = classify_status(StatusCode::FORBIDDEN, &HeaderMap::new(), body);
        assert_eq!(err.message, "nope");
        assert!(err.details.is_none());
    }

    #[test]
    fn message_falls_back_to_the_canonical_reason() {
        let err = classify(503);
        assert_eq!(err.message, "HTTP 503 Service Unavailable");
    }

    #[test]
    fn retry_after_seconds_is_recorded() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("30"));
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert_eq!(err.retry_after, Some(Duration::from_secs(30)));
    }

    #[test]
    fn retry_after_http_date_is_recorded() {
        let date = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(60));
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_str(&date).unwrap());
        let delay = classify_status(StatusCode::TOO_MANY_REQUESTS, &headers, "")
            .retry_after
            .expect("should parse the HTTP date");
        assert!(delay >= Duration::from_secs(58) && delay <= Duration::from_secs(60));
    }

    #[test]
    fn transport_failures_classify_by_flavor() {
        let err = classify_transport(&TransportError::Timeout);
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.status.is_none());

        let err = classify_transport(&TransportError::Network("connection refused".into()));
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.message.contains("connection refused"));
    }
}
