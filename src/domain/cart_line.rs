//! Cart item lines and their deterministic item keys.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ProductId;

/// Attribute name to selected value, e.g. `{"color": "blue"}`.
pub type VariationSelections = BTreeMap<String, String>;

/// Open-ended extension fields attached to a line by the client.
pub type ItemData = BTreeMap<String, serde_json::Value>;

#[derive(Serialize)]
struct KeyMaterial<'a> {
    product_id: ProductId,
    variation_id: Option<ProductId>,
    variation: &'a VariationSelections,
    item_data: &'a ItemData,
}

/// Deterministic digest naming one logical cart line.
///
/// Two add requests for the same product, variation, selections and item
/// data produce the same key, which is how quantities are merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Derives the key for a line from its identifying fields.
    ///
    /// The fields are hashed as canonical JSON (ordered maps), so the key
    /// does not depend on the order the client sent attributes in.
    #[must_use]
    pub fn derive(
        product_id: ProductId,
        variation_id: Option<ProductId>,
        variation: &VariationSelections,
        item_data: &ItemData,
    ) -> Self {
        let material = KeyMaterial {
            product_id,
            variation_id,
            variation,
            item_data,
        };
        let canonical = serde_json::to_vec(&material).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        let prefix: Vec<u8> = digest.iter().take(16).copied().collect();
        Self(hex::encode(prefix))
    }

    /// Wraps a key received from a client path segment.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemLine {
    /// Deterministic line identity.
    pub item_key: ItemKey,
    /// Product (or variable parent) being bought.
    pub product_id: ProductId,
    /// Resolved variation, for variable products.
    #[serde(default)]
    pub variation_id: Option<ProductId>,
    /// Units in the cart.
    pub quantity: f64,
    /// Attribute selections that identify the variation.
    #[serde(default)]
    pub variation: VariationSelections,
    /// Client extension fields.
    #[serde(default)]
    pub item_data: ItemData,
    /// Price that replaces the catalog price for this line.
    #[serde(default)]
    pub unit_price_override: Option<Decimal>,
}

/// A line moved out of the active cart, kept so clients can show that it
/// was removed and offer to restore it.
pub type RemovedItemLine = CartItemLine;

impl CartItemLine {
    /// Creates a line and derives its item key.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        variation_id: Option<ProductId>,
        quantity: f64,
        variation: VariationSelections,
        item_data: ItemData,
    ) -> Self {
        let item_key = ItemKey::derive(product_id, variation_id, &variation, &item_data);
        Self {
            item_key,
            product_id,
            variation_id,
            quantity,
            variation,
            item_data,
            unit_price_override: None,
        }
    }

    /// The catalog entry whose price and stock apply to this line.
    #[must_use]
    pub fn stock_product_id(&self) -> ProductId {
        self.variation_id.unwrap_or(self.product_id)
    }
}
