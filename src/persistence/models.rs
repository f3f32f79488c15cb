//! Database row models for the `carts` table.

use serde::{Deserialize, Serialize};

use crate::domain::{CartKey, CartRecord, CartState};
use crate::error::CartError;

/// A stored row from the `carts` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartRow {
    /// Auto-increment row ID.
    pub id: i64,
    /// Unique cart key.
    pub cart_key: String,
    /// Owning user for authenticated carts.
    pub owner_user_id: Option<i64>,
    /// External customer reference.
    pub customer_ref: Option<String>,
    /// JSONB cart state.
    pub state: serde_json::Value,
    /// Creation time (epoch seconds).
    pub created_at: i64,
    /// Expiry time (epoch seconds).
    pub expires_at: i64,
    /// Start of the renewal window (epoch seconds).
    pub expiring_at: i64,
    /// Provenance tag.
    pub source: String,
    /// Digest of lines and totals.
    pub content_hash: String,
}

impl CartRow {
    /// Converts the row into a domain record.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the stored key or state
    /// cannot be decoded.
    pub fn into_record(self) -> Result<CartRecord, CartError> {
        let cart_key = CartKey::parse(&self.cart_key).map_err(|e| {
            CartError::StorageFailure(format!("stored cart key is invalid: {e}"))
        })?;
        let state: CartState = serde_json::from_value(self.state).map_err(|e| {
            CartError::StorageFailure(format!("stored cart state for {cart_key} is corrupt: {e}"))
        })?;
        Ok(CartRecord {
            id: Some(self.id),
            cart_key,
            owner_user_id: self.owner_user_id,
            customer_ref: self.customer_ref,
            state,
            created_at: self.created_at,
            expires_at: self.expires_at,
            expiring_at: self.expiring_at,
            source: self.source,
            content_hash: self.content_hash,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn row(state: serde_json::Value) -> CartRow {
        CartRow {
            id: 9,
            cart_key: "abc".to_string(),
            owner_user_id: None,
            customer_ref: None,
            state,
            created_at: 1,
            expires_at: 2,
            expiring_at: 2,
            source: "api".to_string(),
            content_hash: String::new(),
        }
    }

    #[test]
    fn empty_state_object_decodes() {
        let Ok(record) = row(serde_json::json!({})).into_record() else {
            panic!("empty state should decode");
        };
        assert_eq!(record.id, Some(9));
        assert!(record.state.is_empty());
    }

    #[test]
    fn corrupt_state_is_a_storage_failure() {
        let result = row(serde_json::json!({ "items": 3 })).into_record();
        assert!(matches!(result, Err(CartError::StorageFailure(_))));
    }
}
