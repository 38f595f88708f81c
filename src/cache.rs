//! TTL-bounded cache of successful GET responses.
//!
//! Entries are keyed by request signature and expire a fixed TTL after
//! insertion. The entry count is bounded; inserting past the bound evicts
//! the oldest-inserted entry (insertion order, not access order, so
//! eviction is predictable). Expired entries read as misses and are removed
//! lazily. The mutex is only ever held between await points.

use crate::transport::RawResponse;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    response: RawResponse,
    expires_at: Instant,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    // Signatures in insertion order; front is next to evict.
    order: VecDeque<String>,
}

/// Stores successful GET responses keyed by request signature.
pub(crate) struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    pub(crate) fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the cached response for the signature, or `None` on a miss
    /// or an expired entry. Expired entries are removed on the way out.
    pub(crate) fn get(&self, signature: &str) -> Option<RawResponse> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let hit = match inner.entries.get(signature) {
            None => return None,
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.response.clone()),
            Some(_) => None,
        };
        if hit.is_none() {
            inner.entries.remove(signature);
            inner.order.retain(|s| s != signature);
        }
        hit
    }

    /// Stores a response under the signature, stamping it with the TTL.
    /// Evicts the oldest-inserted entry when the bound would be exceeded.
    pub(crate) fn insert(&self, signature: &str, response: RawResponse) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        // Re-inserting an existing key counts as a fresh insertion.
        if inner.entries.remove(signature).is_some() {
            inner.order.retain(|s| s != signature);
        }

        while inner.entries.len() >= self.max_entries {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.entries.insert(
            signature.to_owned(),
            CacheEntry {
                response,
                expires_at: Instant::now() + self.ttl,
            },
        );
        inner.order.push_back(signature.to_owned());
    }

    /// Removes the entry for the signature, if present.
    pub(crate) fn invalidate(&self, signature: &str) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if inner.entries.remove(signature).is_some() {
            inner.order.retain(|s| s != signature);
        }
    }

    /// Drops every entry.
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.clear();
        inner.order.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }
}
