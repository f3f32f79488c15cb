//! Product catalog and stock reservation collaborators.
//!
//! The cart never owns product data: it asks a [`ProductCatalog`] for the
//! current product on every request and a [`StockReservations`] source for
//! units held by in-flight checkouts.

pub mod memory;
pub mod reservations;

use std::fmt;

use async_trait::async_trait;

pub use memory::{CatalogLoadError, InMemoryCatalog};
pub use reservations::{InMemoryReservations, PostgresReservations, StockReservations};

use crate::domain::{Product, ProductId, VariationSelections};
use crate::error::CartError;

/// Read-only product lookup.
#[async_trait]
pub trait ProductCatalog: Send + Sync + fmt::Debug {
    /// Returns the product with `id`, including trashed or drafted ones
    /// (the caller decides whether they count as existing).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the catalog is unreachable.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CartError>;

    /// Finds the variation of `parent` matching `selections`.
    ///
    /// A variation matches when each of its fixed attribute values equals
    /// the selection for that attribute; "any" attributes match whatever
    /// was selected.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the catalog is unreachable.
    async fn find_variation(
        &self,
        parent: &Product,
        selections: &VariationSelections,
    ) -> Result<Option<ProductId>, CartError>;
}
