//! Bearer-token supply and refresh.
//!
//! The client consults a [`TokenProvider`] before every attempt and asks it
//! to refresh exactly once when an attempt comes back unauthorized.
//! Providers that refresh over the network must use a [`Transport`]
//! directly rather than the client, so the refresh call never re-enters the
//! cache, dedup, or retry machinery.
//!
//! [`Transport`]: crate::transport::Transport

use crate::error::{ApiError, ErrorKind};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::SystemTime;

/// A bearer token and its optional expiry.
#[derive(Debug, Clone)]
pub struct AuthToken {
    /// The bearer string, sent as `Authorization: Bearer <token>`.
    pub token: String,
    /// When the token stops being valid, if known.
    pub expires_at: Option<SystemTime>,
}

impl AuthToken {
    /// Creates a token without an expiry.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Creates a token that expires at the given time.
    pub fn expiring_at(token: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Returns `true` if the token's expiry has passed.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= SystemTime::now(),
            None => false,
        }
    }
}

/// Supplies the current bearer token and refreshes it on demand.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns the current token, or `None` when no token is held.
    async fn token(&self) -> Option<AuthToken>;

    /// Obtains a fresh token.
    ///
    /// Called by the client at most once per logical request, after an
    /// unauthorized attempt. On failure the implementation must clear any
    /// stored token so later requests do not present a stale one; the
    /// error surfaces to the original caller as `Unauthorized`.
    async fn refresh(&self) -> crate::Result<AuthToken>;
}

/// A provider holding a fixed token with no refresh path.
///
/// Refreshing always fails and drops the stored token, which matches APIs
/// that use long-lived personal access tokens: once the server rejects the
/// token there is nothing the client can do on its own.
pub struct StaticTokenProvider {
    token: Mutex<Option<AuthToken>>,
}

impl StaticTokenProvider {
    /// Creates a provider that always serves the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(AuthToken::new(token))),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Option<AuthToken> {
        self.token.lock().expect("token lock poisoned").clone()
    }

    async fn refresh(&self) -> crate::Result<AuthToken> {
        self.token.lock().expect("token lock poisoned").take();
        Err(ApiError::new(
            ErrorKind::Unauthorized,
            "static token rejected and cannot be refreshed",
        ))
    }
}
