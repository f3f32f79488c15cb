//! In-memory cart contents: lines, removed lines, adjustments and totals.
//!
//! [`CartState`] is exactly what the store serializes into a cart record.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CartItemLine, ItemKey, ProductId, RemovedItemLine};

/// A fee line added to the cart (gift wrap, handling, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeLine {
    /// Display name.
    pub name: String,
    /// Fee amount before tax.
    pub amount: Decimal,
    /// Whether the tax rate applies to this fee.
    #[serde(default)]
    pub taxable: bool,
}

/// Totals computed by the pricing engine after every structural mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of line prices before tax and discounts.
    pub subtotal: Decimal,
    /// Tax on the line subtotal.
    pub subtotal_tax: Decimal,
    /// Discounts from applied coupons.
    pub discount_total: Decimal,
    /// Shipping cost for the chosen methods.
    pub shipping_total: Decimal,
    /// Sum of fee lines.
    pub fee_total: Decimal,
    /// All tax (lines, fees, shipping).
    pub total_tax: Decimal,
    /// Amount payable.
    pub total: Decimal,
}

/// Serialized cart contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    /// Active lines keyed by item key.
    #[serde(default)]
    pub items: BTreeMap<ItemKey, CartItemLine>,
    /// Lines moved aside by removal or because the product went away.
    #[serde(default)]
    pub removed_items: BTreeMap<ItemKey, RemovedItemLine>,
    /// Coupon codes applied to the cart.
    #[serde(default)]
    pub applied_coupons: Vec<String>,
    /// Fee lines.
    #[serde(default)]
    pub fees: Vec<FeeLine>,
    /// Selected shipping method per package.
    #[serde(default)]
    pub chosen_shipping_methods: Vec<String>,
    /// Last computed totals.
    #[serde(default)]
    pub totals: CartTotals,
}

#[derive(Serialize)]
struct HashMaterial<'a> {
    items: &'a BTreeMap<ItemKey, CartItemLine>,
    totals: &'a CartTotals,
}

impl CartState {
    /// Returns `true` if the cart has no active lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all active lines.
    #[must_use]
    pub fn item_count(&self) -> f64 {
        self.items.values().map(|line| line.quantity).sum()
    }

    /// Quantity of the line with `key`, zero if absent.
    #[must_use]
    pub fn line_quantity(&self, key: &ItemKey) -> f64 {
        self.items.get(key).map_or(0.0, |line| line.quantity)
    }

    /// Units of one stock-keeping product across every line, optionally
    /// ignoring one line (the line being updated).
    #[must_use]
    pub fn quantity_of_product(&self, stock_product: ProductId, except: Option<&ItemKey>) -> f64 {
        self.items
            .values()
            .filter(|line| line.stock_product_id() == stock_product)
            .filter(|line| Some(&line.item_key) != except)
            .map(|line| line.quantity)
            .sum()
    }

    /// Moves an active line into the removed history.
    pub fn move_to_removed(&mut self, key: &ItemKey) -> Option<RemovedItemLine> {
        let line = self.items.remove(key)?;
        self.removed_items.insert(key.clone(), line.clone());
        Some(line)
    }

    /// Empties lines, coupons, fees, shipping selections and totals. The
    /// removed history survives only when `keep_removed_items` is set.
    pub fn clear(&mut self, keep_removed_items: bool) {
        self.items.clear();
        self.applied_coupons.clear();
        self.fees.clear();
        self.chosen_shipping_methods.clear();
        self.totals = CartTotals::default();
        if !keep_removed_items {
            self.removed_items.clear();
        }
    }

    /// Merges another cart into this one: quantities of shared item keys
    /// are summed, new lines are added, and removed history and coupons are
    /// unioned.
    pub fn absorb(&mut self, other: Self) {
        for (key, line) in other.items {
            self.items
                .entry(key)
                .and_modify(|existing| existing.quantity += line.quantity)
                .or_insert(line);
        }
        for (key, line) in other.removed_items {
            if !self.items.contains_key(&key) {
                self.removed_items.entry(key).or_insert(line);
            }
        }
        for coupon in other.applied_coupons {
            if !self.applied_coupons.contains(&coupon) {
                self.applied_coupons.push(coupon);
            }
        }
        self.fees.extend(other.fees);
        if self.chosen_shipping_methods.is_empty() {
            self.chosen_shipping_methods = other.chosen_shipping_methods;
        }
    }

    /// SHA-256 hex digest of the active lines and totals.
    ///
    /// Clients compare it between responses to detect changes cheaply.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let material = HashMaterial {
            items: &self.items,
            totals: &self.totals,
        };
        let bytes = serde_json::to_vec(&material).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}
