//! In-process cart store.
//!
//! Records live in a `RwLock<HashMap<..>>`; the write lock makes upserts
//! atomic per key. Used when `PERSISTENCE_ENABLED=false` and in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CartStore;
use crate::domain::{CartKey, CartRecord};
use crate::error::CartError;

/// Cart store backed by a process-local map.
#[derive(Debug)]
pub struct MemoryCartStore {
    records: RwLock<HashMap<CartKey, CartRecord>>,
    next_id: AtomicI64,
}

impl MemoryCartStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Returns the number of rows, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryCartStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn get(&self, key: &CartKey, now: i64) -> Result<Option<CartRecord>, CartError> {
        let map = self.records.read().await;
        Ok(map
            .get(key)
            .filter(|record| !record.is_expired(now))
            .cloned())
    }

    async fn upsert(&self, mut record: CartRecord) -> Result<CartRecord, CartError> {
        record.seal();
        let mut map = self.records.write().await;
        match map.get(&record.cart_key) {
            Some(existing) => {
                record.id = existing.id;
                record.created_at = existing.created_at;
            }
            None => {
                record.id = Some(self.next_id.fetch_add(1, Ordering::Relaxed));
            }
        }
        map.insert(record.cart_key.clone(), record.clone());
        Ok(record)
    }

    async fn delete(&self, key: &CartKey) -> Result<bool, CartError> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn sweep(&self, now: i64) -> Result<u64, CartError> {
        let mut map = self.records.write().await;
        let before = map.len();
        map.retain(|_, record| !record.is_expired(now));
        Ok(u64::try_from(before - map.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{CartItemLine, CartState, ExpiryPolicy, ItemData, ProductId};

    fn record(key: &CartKey, now: i64, lines: &[(u64, f64)]) -> CartRecord {
        let mut state = CartState::default();
        for (product, quantity) in lines {
            let line = CartItemLine::new(
                ProductId::new(*product),
                None,
                *quantity,
                Default::default(),
                ItemData::new(),
            );
            state.items.insert(line.item_key.clone(), line);
        }
        CartRecord::new(key.clone(), state, now, ExpiryPolicy::new(100, 0.1), "api")
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_lines() {
        let store = MemoryCartStore::new();
        let key = CartKey::generate();
        let original = record(&key, 0, &[(1, 2.0), (2, 1.0), (3, 5.0)]);

        let Ok(saved) = store.upsert(original.clone()).await else {
            panic!("upsert failed");
        };
        let Ok(Some(loaded)) = store.get(&key, 10).await else {
            panic!("record missing");
        };
        assert_eq!(loaded.state.items, original.state.items);
        assert_eq!(loaded.content_hash, saved.content_hash);
        assert_eq!(loaded.content_hash, original.state.content_hash());
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_key() {
        let store = MemoryCartStore::new();
        let key = CartKey::generate();
        let Ok(first) = store.upsert(record(&key, 0, &[(1, 1.0)])).await else {
            panic!("first upsert failed");
        };
        let Ok(second) = store.upsert(record(&key, 5, &[(1, 3.0)])).await else {
            panic!("second upsert failed");
        };
        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn expired_records_are_absent_before_sweep() {
        let store = MemoryCartStore::new();
        let key = CartKey::generate();
        let _ = store.upsert(record(&key, 0, &[(1, 1.0)])).await;

        let Ok(loaded) = store.get(&key, 101).await else {
            panic!("get failed");
        };
        assert!(loaded.is_none());
        assert_eq!(store.len().await, 1);

        let Ok(swept) = store.sweep(101).await else {
            panic!("sweep failed");
        };
        assert_eq!(swept, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_reports_removal() {
        let store = MemoryCartStore::new();
        let key = CartKey::generate();
        let _ = store.upsert(record(&key, 0, &[(1, 1.0)])).await;
        assert!(matches!(store.delete(&key).await, Ok(true)));
        assert!(matches!(store.delete(&key).await, Ok(false)));
    }
}
