//! Read-through cache in front of a [`CartStore`].

use std::sync::Arc;

use super::{CartCache, CartStore};
use crate::domain::{CartKey, CartRecord};
use crate::error::CartError;

/// Cart store with an optional read-through cache.
///
/// Reads try the cache first and fall back to the store, populating the
/// cache with a TTL bounded by the record's remaining lifetime. Writes go
/// to the store first and then refresh the cache. Cache failures are
/// logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct CachedCartStore {
    store: Arc<dyn CartStore>,
    cache: Option<Arc<dyn CartCache>>,
}

impl CachedCartStore {
    /// Wraps `store`, optionally fronted by `cache`.
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>, cache: Option<Arc<dyn CartCache>>) -> Self {
        Self { store, cache }
    }

    /// Returns the underlying durable store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CartStore> {
        &self.store
    }

    /// Cache-first lookup of a live record.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the durable store fails.
    pub async fn get(&self, key: &CartKey, now: i64) -> Result<Option<CartRecord>, CartError> {
        if let Some(record) = self.cache_get(key).await {
            if !record.is_expired(now) {
                return Ok(Some(record));
            }
            self.cache_delete(key).await;
        }

        let record = self.store.get(key, now).await?;
        if let Some(record) = &record {
            self.cache_put(record, now).await;
        }
        Ok(record)
    }

    /// Lookup that bypasses the cache, for post-write verification.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the durable store fails.
    pub async fn get_fresh(
        &self,
        key: &CartKey,
        now: i64,
    ) -> Result<Option<CartRecord>, CartError> {
        self.store.get(key, now).await
    }

    /// Writes the record to the store, then refreshes the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the durable store fails.
    pub async fn upsert(&self, record: CartRecord, now: i64) -> Result<CartRecord, CartError> {
        let saved = self.store.upsert(record).await?;
        self.cache_put(&saved, now).await;
        Ok(saved)
    }

    /// Deletes the record and its cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the durable store fails.
    pub async fn delete(&self, key: &CartKey) -> Result<bool, CartError> {
        self.cache_delete(key).await;
        self.store.delete(key).await
    }

    /// Deletes expired records. Cache entries expire on their own since
    /// their TTL never exceeds the record's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the durable store fails.
    pub async fn sweep(&self, now: i64) -> Result<u64, CartError> {
        self.store.sweep(now).await
    }

    async fn cache_get(&self, key: &CartKey) -> Option<CartRecord> {
        let cache = self.cache.as_ref()?;
        match cache.get(key.as_str()).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(cart_key = %key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(cart_key = %key, error = %e, "cart cache read failed");
                None
            }
        }
    }

    async fn cache_put(&self, record: &CartRecord, now: i64) {
        let Some(cache) = &self.cache else {
            return;
        };
        let Some(ttl) = record.remaining_ttl(now) else {
            return;
        };
        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(cart_key = %record.cart_key, error = %e, "cannot encode cart for cache");
                return;
            }
        };
        if let Err(e) = cache.set(record.cart_key.as_str(), bytes, ttl).await {
            tracing::warn!(cart_key = %record.cart_key, error = %e, "cart cache write failed");
        }
    }

    async fn cache_delete(&self, key: &CartKey) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.delete(key.as_str()).await
        {
            tracing::warn!(cart_key = %key, error = %e, "cart cache delete failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{CartItemLine, CartState, ExpiryPolicy, ItemData, ProductId};
    use crate::persistence::{CacheError, InMemoryCartCache, MemoryCartStore};

    #[derive(Debug)]
    struct BrokenCache;

    #[async_trait]
    impl CartCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("connection reset".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection reset".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection reset".to_string()))
        }
    }

    fn record(key: &CartKey) -> CartRecord {
        let mut state = CartState::default();
        let line = CartItemLine::new(
            ProductId::new(1),
            None,
            2.0,
            Default::default(),
            ItemData::new(),
        );
        state.items.insert(line.item_key.clone(), line);
        CartRecord::new(key.clone(), state, 0, ExpiryPolicy::new(100, 0.1), "api")
    }

    #[tokio::test]
    async fn reads_are_served_from_cache_after_write() {
        let backing = Arc::new(MemoryCartStore::new());
        let cache = Arc::new(InMemoryCartCache::new());
        let store = CachedCartStore::new(
            Arc::clone(&backing) as Arc<dyn CartStore>,
            Some(Arc::clone(&cache) as Arc<dyn CartCache>),
        );
        let key = CartKey::generate();
        let _ = store.upsert(record(&key), 0).await;
        assert_eq!(cache.len(), 1);

        // Drop the row behind the cache's back: the cached copy still serves.
        let _ = backing.delete(&key).await;
        let Ok(Some(_)) = store.get(&key, 10).await else {
            panic!("expected cached record");
        };
        let Ok(None) = store.get_fresh(&key, 10).await else {
            panic!("fresh read must bypass the cache");
        };
    }

    #[tokio::test]
    async fn expired_cache_entries_are_ignored() {
        let backing = Arc::new(MemoryCartStore::new());
        let cache = Arc::new(InMemoryCartCache::new());
        let store = CachedCartStore::new(
            backing as Arc<dyn CartStore>,
            Some(cache as Arc<dyn CartCache>),
        );
        let key = CartKey::generate();
        let _ = store.upsert(record(&key), 0).await;
        assert!(matches!(store.get(&key, 500).await, Ok(None)));
    }

    #[tokio::test]
    async fn failing_cache_is_not_fatal() {
        let store = CachedCartStore::new(
            Arc::new(MemoryCartStore::new()) as Arc<dyn CartStore>,
            Some(Arc::new(BrokenCache) as Arc<dyn CartCache>),
        );
        let key = CartKey::generate();
        let Ok(saved) = store.upsert(record(&key), 0).await else {
            panic!("upsert must succeed without a cache");
        };
        let Ok(Some(loaded)) = store.get(&key, 1).await else {
            panic!("get must fall back to the store");
        };
        assert_eq!(loaded.content_hash, saved.content_hash);
        assert!(matches!(store.delete(&key).await, Ok(true)));
    }

    #[tokio::test]
    async fn works_without_cache() {
        let store = CachedCartStore::new(Arc::new(MemoryCartStore::new()), None);
        let key = CartKey::generate();
        let _ = store.upsert(record(&key), 0).await;
        assert!(matches!(store.get(&key, 1).await, Ok(Some(_))));
    }
}
