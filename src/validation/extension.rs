//! Extension stages around item validation and persistence.
//!
//! Extensions run in registration order. A validation stage that returns an
//! error stops the pipeline and its error reaches the client unchanged.

use std::fmt;
use std::sync::Arc;

use super::{ItemCandidate, ValidatedItem};
use crate::domain::{CartKey, CartState};
use crate::error::CartError;

/// A hook into the cart lifecycle. Every stage defaults to a no-op.
pub trait CartExtension: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs before any built-in check; may rewrite the candidate.
    ///
    /// # Errors
    ///
    /// Any [`CartError`] rejects the item.
    fn pre_validate(&self, _candidate: &mut ItemCandidate, _cart: &CartState) -> Result<(), CartError> {
        Ok(())
    }

    /// Runs after every built-in check has passed.
    ///
    /// # Errors
    ///
    /// Any [`CartError`] rejects the item.
    fn post_validate(&self, _item: &ValidatedItem, _cart: &CartState) -> Result<(), CartError> {
        Ok(())
    }

    /// Runs right before the cart is written to storage.
    fn pre_persist(&self, _key: &CartKey, _cart: &mut CartState) {}
}

/// Ordered set of registered extensions.
#[derive(Debug, Clone, Default)]
pub struct Extensions {
    stages: Vec<Arc<dyn CartExtension>>,
}

impl Extensions {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an extension.
    #[must_use]
    pub fn with(mut self, extension: Arc<dyn CartExtension>) -> Self {
        self.stages.push(extension);
        self
    }

    /// Number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn pre_validate(
        &self,
        candidate: &mut ItemCandidate,
        cart: &CartState,
    ) -> Result<(), CartError> {
        for stage in &self.stages {
            stage.pre_validate(candidate, cart).inspect_err(|e| {
                tracing::debug!(extension = stage.name(), error = %e, "pre-validate rejected item");
            })?;
        }
        Ok(())
    }

    pub(crate) fn post_validate(&self, item: &ValidatedItem, cart: &CartState) -> Result<(), CartError> {
        for stage in &self.stages {
            stage.post_validate(item, cart).inspect_err(|e| {
                tracing::debug!(extension = stage.name(), error = %e, "post-validate rejected item");
            })?;
        }
        Ok(())
    }

    pub(crate) fn pre_persist(&self, key: &CartKey, cart: &mut CartState) {
        for stage in &self.stages {
            stage.pre_persist(key, cart);
        }
    }
}

/// Caps the number of custom data entries a line may carry.
#[derive(Debug, Clone, Copy)]
pub struct ItemDataLimit {
    max_entries: usize,
}

impl ItemDataLimit {
    /// Allows at most `max_entries` entries per line.
    #[must_use]
    pub const fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }
}

impl CartExtension for ItemDataLimit {
    fn name(&self) -> &'static str {
        "item_data_limit"
    }

    fn pre_validate(&self, candidate: &mut ItemCandidate, _cart: &CartState) -> Result<(), CartError> {
        if candidate.item_data.len() > self.max_entries {
            return Err(CartError::invalid(
                "cart_item_data_too_large",
                format!(
                    "Item data may contain at most {} entries.",
                    self.max_entries
                ),
            ));
        }
        Ok(())
    }
}
