//! Best-effort cart cache.
//!
//! The cache is an accelerator, never a source of truth: every caller
//! must work when it is absent or failing.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// Errors raised by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache backend unavailable: {0}")]
    Backend(String),
}

/// Byte-oriented cache keyed by cart key.
#[async_trait]
pub trait CartCache: Send + Sync + fmt::Debug {
    /// Returns the cached bytes for `key`, `None` on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key` for at most `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Drops the entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local cache with per-entry expiry.
///
/// Uses a `DashMap` for sharded concurrent access; expired entries are
/// evicted lazily on read.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartCache {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryCartCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl CartCache for InMemoryCartCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.store.get(key)
            && !entry.is_expired()
        {
            tracing::trace!(key, "cart cache hit");
            return Ok(Some(entry.data.clone()));
        }
        self.store.remove(key);
        tracing::trace!(key, "cart cache miss");
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data: value,
            expires_at: Instant::now() + ttl,
        };
        self.store.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = InMemoryCartCache::new();
        let _ = cache.set("k", vec![1, 2, 3], Duration::from_secs(60)).await;
        let Ok(Some(bytes)) = cache.get("k").await else {
            panic!("expected hit");
        };
        assert_eq!(bytes, vec![1, 2, 3]);

        let _ = cache.delete("k").await;
        assert!(matches!(cache.get("k").await, Ok(None)));
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_read() {
        let cache = InMemoryCartCache::new();
        let _ = cache.set("k", vec![1], Duration::ZERO).await;
        assert!(matches!(cache.get("k").await, Ok(None)));
        assert!(cache.is_empty());
    }
}
