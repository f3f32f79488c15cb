//! Cart mutation operations.
//!
//! Every operation works on an open [`CartSession`]; the caller saves the
//! session afterwards, whether or not the operation succeeded, so that
//! earlier changes in the same request are kept. Each operation stages its
//! change on a copy of the cart and commits it only once totals have been
//! computed, so a failed operation leaves the session untouched.

use std::sync::Arc;

use crate::domain::{CartItemLine, CartState, ItemKey, RemovedItemLine};
use crate::error::{CartError, ErrorKind};
use crate::pricing::PricingEngine;
use crate::session::CartSession;
use crate::validation::{ItemCandidate, ValidationPipeline};

/// Applies validated mutations to a cart session.
#[derive(Debug, Clone)]
pub struct CartService {
    pipeline: ValidationPipeline,
    pricing: Arc<dyn PricingEngine>,
}

impl CartService {
    /// Creates a new `CartService`.
    #[must_use]
    pub fn new(pipeline: ValidationPipeline, pricing: Arc<dyn PricingEngine>) -> Self {
        Self { pipeline, pricing }
    }

    /// Returns the validation pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &ValidationPipeline {
        &self.pipeline
    }

    /// Adds an item, merging it into an existing line with the same item
    /// key. Returns the resulting line.
    ///
    /// # Errors
    ///
    /// Returns the validation error that rejected the item,
    /// [`CartError::InvalidInput`] if the cart total would overflow, or
    /// [`CartError::StorageFailure`] if a collaborator is unreachable.
    pub async fn add_item(
        &self,
        session: &mut CartSession,
        candidate: ItemCandidate,
    ) -> Result<CartItemLine, CartError> {
        let item = self.pipeline.validate_add(candidate, session.state()).await?;
        let key = item.item_key.clone();
        let quantity = item.quantity;

        let mut next = session.state().clone();
        next.removed_items.remove(&key);
        let line = next
            .items
            .entry(key)
            .and_modify(|line| line.quantity += quantity)
            .or_insert_with(|| item.into_line())
            .clone();
        self.commit(session, next).await?;

        tracing::debug!(
            cart_key = %session.key(),
            item_key = %line.item_key,
            quantity = line.quantity,
            "added item"
        );
        Ok(line)
    }

    /// Adds several items in order, stopping at the first failure. Items
    /// added before the failure stay in the cart.
    ///
    /// # Errors
    ///
    /// Returns the first item's [`CartError`].
    pub async fn add_items(
        &self,
        session: &mut CartSession,
        candidates: Vec<ItemCandidate>,
    ) -> Result<Vec<CartItemLine>, CartError> {
        let mut added = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            added.push(self.add_item(session, candidate).await?);
        }
        Ok(added)
    }

    /// Sets a line's quantity. Zero removes the line and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] if the line does not exist, or the
    /// validation error for the new quantity.
    pub async fn update_item(
        &self,
        session: &mut CartSession,
        item_key: &ItemKey,
        quantity: f64,
    ) -> Result<Option<CartItemLine>, CartError> {
        let Some(line) = session.state().items.get(item_key).cloned() else {
            return Err(item_not_found());
        };
        if quantity == 0.0 {
            self.remove_item(session, item_key).await?;
            return Ok(None);
        }

        self.pipeline
            .validate_quantity(&line, quantity, session.state())
            .await?;

        let mut next = session.state().clone();
        let updated = next.items.get_mut(item_key).map(|line| {
            line.quantity = quantity;
            line.clone()
        });
        self.commit(session, next).await?;
        Ok(updated)
    }

    /// Moves a line to the removed history.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] if the line does not exist.
    pub async fn remove_item(
        &self,
        session: &mut CartSession,
        item_key: &ItemKey,
    ) -> Result<RemovedItemLine, CartError> {
        let mut next = session.state().clone();
        let removed = next.move_to_removed(item_key).ok_or_else(item_not_found)?;
        self.commit(session, next).await?;
        tracing::debug!(cart_key = %session.key(), item_key = %item_key, "removed item");
        Ok(removed)
    }

    /// Returns a removed line to the cart after validating it again.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] if the line is not in the removed
    /// history, or the validation error that rejected it.
    pub async fn restore_item(
        &self,
        session: &mut CartSession,
        item_key: &ItemKey,
    ) -> Result<CartItemLine, CartError> {
        let Some(removed) = session.state().removed_items.get(item_key).cloned() else {
            return Err(CartError::not_found(
                "cart_removed_item_not_found",
                "Item is not in the list of removed items.",
            ));
        };
        let line = self
            .add_item(session, ItemCandidate::from_line(&removed))
            .await?;
        if line.item_key != *item_key {
            session.state_mut().removed_items.remove(item_key);
        }
        Ok(line)
    }

    /// Empties the cart. The removed history is kept only when asked.
    ///
    /// The session is marked for a forced save followed by a read-back
    /// check, so a concurrent writer that reintroduces lines surfaces as a
    /// conflict when the session is finished.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if totals cannot be computed.
    pub async fn clear(
        &self,
        session: &mut CartSession,
        keep_removed_items: bool,
    ) -> Result<(), CartError> {
        let mut next = session.state().clone();
        next.clear(keep_removed_items);
        self.commit(session, next).await?;
        session.require_empty_persist();
        tracing::info!(cart_key = %session.key(), keep_removed_items, "cleared cart");
        Ok(())
    }

    /// Moves lines whose product disappeared or stopped being purchasable
    /// to the removed history and refreshes totals. Returns the moved keys.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if a collaborator is
    /// unreachable.
    pub async fn revalidate(&self, session: &mut CartSession) -> Result<Vec<ItemKey>, CartError> {
        let mut next = session.state().clone();
        let mut unavailable = Vec::new();
        for line in session.state().items.values() {
            if !self.pipeline.is_available(line).await? {
                next.move_to_removed(&line.item_key);
                unavailable.push(line.item_key.clone());
            }
        }
        next.totals = self.pricing.recompute(&next).await?;

        if !unavailable.is_empty() {
            tracing::info!(
                cart_key = %session.key(),
                count = unavailable.len(),
                "moved unavailable items to removed history"
            );
        }
        if !unavailable.is_empty() || next.totals != session.state().totals {
            *session.state_mut() = next;
        }
        Ok(unavailable)
    }

    /// Brings every line back within its limits after carts were merged.
    ///
    /// Each line is checked against the catalog, quantity bounds and stock
    /// in item-key order, counting the lines already settled. A line over
    /// its limits is cut down to the largest quantity that passes; a line
    /// with no acceptable quantity goes to the removed history. Returns the
    /// keys that changed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if a collaborator is
    /// unreachable, or [`CartError::InvalidInput`] if the merged total
    /// overflows.
    pub async fn reconcile(&self, session: &mut CartSession) -> Result<Vec<ItemKey>, CartError> {
        let mut next = session.state().clone();
        let mut adjusted = Vec::new();
        for (key, line) in &session.state().items {
            if self.pipeline.is_available(line).await? {
                match self.pipeline.validate_quantity(line, line.quantity, &next).await {
                    Ok(()) => continue,
                    Err(err) if err.kind() == ErrorKind::StorageFailure => return Err(err),
                    Err(_) => {}
                }
            }
            match self.pipeline.fit_quantity(line, &next).await? {
                Some(quantity) => {
                    if let Some(line) = next.items.get_mut(key) {
                        line.quantity = quantity;
                    }
                }
                None => {
                    next.move_to_removed(key);
                }
            }
            adjusted.push(key.clone());
        }

        if !adjusted.is_empty() {
            tracing::info!(
                cart_key = %session.key(),
                count = adjusted.len(),
                "adjusted merged lines to fit limits"
            );
        }
        self.commit(session, next).await?;
        Ok(adjusted)
    }

    async fn commit(&self, session: &mut CartSession, mut next: CartState) -> Result<(), CartError> {
        next.totals = self.pricing.recompute(&next).await?;
        *session.state_mut() = next;
        Ok(())
    }
}

fn item_not_found() -> CartError {
    CartError::not_found(
        "cart_item_not_found",
        "Item specified does not exist in cart.",
    )
}
