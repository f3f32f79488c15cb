//! PostgreSQL implementation of the cart store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::CartStore;
use super::models::CartRow;
use crate::domain::{CartKey, CartRecord};
use crate::error::CartError;

/// PostgreSQL-backed cart store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn get(&self, key: &CartKey, now: i64) -> Result<Option<CartRecord>, CartError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, cart_key, owner_user_id, customer_ref, state, created_at, \
             expires_at, expiring_at, source, content_hash \
             FROM carts WHERE cart_key = $1 AND expires_at >= $2",
        )
        .bind(key.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CartError::StorageFailure(e.to_string()))?;

        row.map(CartRow::into_record).transpose()
    }

    async fn upsert(&self, mut record: CartRecord) -> Result<CartRecord, CartError> {
        record.seal();
        let state = serde_json::to_value(&record.state)
            .map_err(|e| CartError::StorageFailure(format!("cannot encode cart state: {e}")))?;

        let (id, created_at) = sqlx::query_as::<_, (i64, i64)>(
            "INSERT INTO carts (cart_key, owner_user_id, customer_ref, state, created_at, \
             expires_at, expiring_at, source, content_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (cart_key) DO UPDATE SET \
             owner_user_id = EXCLUDED.owner_user_id, \
             customer_ref = EXCLUDED.customer_ref, \
             state = EXCLUDED.state, \
             expires_at = EXCLUDED.expires_at, \
             expiring_at = EXCLUDED.expiring_at, \
             source = EXCLUDED.source, \
             content_hash = EXCLUDED.content_hash \
             RETURNING id, created_at",
        )
        .bind(record.cart_key.as_str())
        .bind(record.owner_user_id)
        .bind(record.customer_ref.as_deref())
        .bind(&state)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.expiring_at)
        .bind(&record.source)
        .bind(&record.content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CartError::StorageFailure(e.to_string()))?;

        record.id = Some(id);
        record.created_at = created_at;
        Ok(record)
    }

    async fn delete(&self, key: &CartKey) -> Result<bool, CartError> {
        let result = sqlx::query("DELETE FROM carts WHERE cart_key = $1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CartError::StorageFailure(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn sweep(&self, now: i64) -> Result<u64, CartError> {
        let result = sqlx::query("DELETE FROM carts WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| CartError::StorageFailure(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
