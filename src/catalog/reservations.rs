//! Stock held by in-flight checkouts.
//!
//! A reservation is created when checkout starts and released when the
//! order completes or the hold expires. The cart only reads these counts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;

use crate::domain::ProductId;
use crate::error::CartError;

/// Source of reserved stock counts.
#[async_trait]
pub trait StockReservations: Send + Sync + fmt::Debug {
    /// Units of `product` held by active reservations, not counting the
    /// reservation of `exclude_draft_order` (the requester's own checkout).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the source is unreachable.
    async fn reserved_units(
        &self,
        product: ProductId,
        exclude_draft_order: Option<&str>,
    ) -> Result<f64, CartError>;
}

/// Reservations kept in process, keyed by product then order reference.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReservations {
    held: Arc<DashMap<ProductId, HashMap<String, f64>>>,
}

impl InMemoryReservations {
    /// Creates an empty reservation table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds `quantity` units of `product` for `order_ref`, replacing any
    /// earlier hold by the same order.
    pub fn reserve(&self, product: ProductId, order_ref: impl Into<String>, quantity: f64) {
        self.held
            .entry(product)
            .or_default()
            .insert(order_ref.into(), quantity);
    }
}

#[async_trait]
impl StockReservations for InMemoryReservations {
    async fn reserved_units(
        &self,
        product: ProductId,
        exclude_draft_order: Option<&str>,
    ) -> Result<f64, CartError> {
        let Some(orders) = self.held.get(&product) else {
            return Ok(0.0);
        };
        Ok(orders
            .iter()
            .filter(|(order, _)| Some(order.as_str()) != exclude_draft_order)
            .map(|(_, quantity)| *quantity)
            .sum())
    }
}

/// Reservations read from the `stock_reservations` table.
#[derive(Debug, Clone)]
pub struct PostgresReservations {
    pool: PgPool,
}

impl PostgresReservations {
    /// Creates a reader over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockReservations for PostgresReservations {
    async fn reserved_units(
        &self,
        product: ProductId,
        exclude_draft_order: Option<&str>,
    ) -> Result<f64, CartError> {
        let product_id = i64::try_from(product.get())
            .map_err(|_| CartError::invalid("cart_invalid_product_id", "Product id is out of range."))?;

        let reserved = sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(stock_quantity), 0)::DOUBLE PRECISION FROM stock_reservations \
             WHERE product_id = $1 AND expires_at > NOW() \
             AND ($2::TEXT IS NULL OR order_ref <> $2)",
        )
        .bind(product_id)
        .bind(exclude_draft_order)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CartError::StorageFailure(e.to_string()))?;

        Ok(reserved)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sums_holds_except_own_draft() {
        let reservations = InMemoryReservations::new();
        let mug = ProductId::new(1);
        reservations.reserve(mug, "order-a", 2.0);
        reservations.reserve(mug, "order-b", 1.0);
        reservations.reserve(ProductId::new(2), "order-a", 9.0);

        let Ok(all) = reservations.reserved_units(mug, None).await else {
            panic!("lookup failed");
        };
        assert!((all - 3.0).abs() < f64::EPSILON);

        let Ok(others) = reservations.reserved_units(mug, Some("order-a")).await else {
            panic!("lookup failed");
        };
        assert!((others - 1.0).abs() < f64::EPSILON);
    }
}
