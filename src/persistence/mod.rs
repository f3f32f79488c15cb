//! Persistence layer: durable cart records plus a best-effort cache.
//!
//! [`CartStore`] is the source of truth. [`PostgresCartStore`] keeps
//! records in the `carts` table; [`MemoryCartStore`] keeps them in process
//! when persistence is disabled. [`CachedCartStore`] fronts either with an
//! optional [`CartCache`].

pub mod cache;
pub mod cached;
pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

pub use cache::{CacheError, CartCache, InMemoryCartCache};
pub use cached::CachedCartStore;
pub use memory::MemoryCartStore;
pub use postgres::PostgresCartStore;

use crate::domain::{CartKey, CartRecord};
use crate::error::CartError;

/// Durable key/value storage of cart records.
///
/// Implementations must make `upsert` atomic with respect to the unique
/// cart key: two concurrent upserts of a new key produce one row, and the
/// later write wins.
#[async_trait]
pub trait CartStore: Send + Sync + fmt::Debug {
    /// Loads the record for `key`. Records whose `expires_at` is before
    /// `now` are reported as absent even if the row still exists.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] on backend failure.
    async fn get(&self, key: &CartKey, now: i64) -> Result<Option<CartRecord>, CartError>;

    /// Inserts or replaces the record for `record.cart_key`, recomputing
    /// its content hash. Returns the stored record with its row id.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] on backend failure.
    async fn upsert(&self, record: CartRecord) -> Result<CartRecord, CartError>;

    /// Deletes the record for `key`. Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] on backend failure.
    async fn delete(&self, key: &CartKey) -> Result<bool, CartError>;

    /// Deletes every record that expired before `now`, returning how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] on backend failure.
    async fn sweep(&self, now: i64) -> Result<u64, CartError>;
}
