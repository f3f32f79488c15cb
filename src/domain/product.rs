//! Read-only product model supplied by the catalog.
//!
//! Products are resolved per request and never cached inside a cart
//! record beyond their [`ProductId`].

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog identifier of a product or variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

impl ProductId {
    /// Wraps a raw catalog id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw catalog id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Structural type of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Stand-alone product.
    #[default]
    Simple,
    /// Parent product whose purchasable units are its variations.
    Variable,
    /// Child of a variable product with fixed or "any" attribute values.
    Variation,
}

/// Publication status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Publicly visible.
    #[default]
    Publish,
    /// Visible to privileged users only; still purchasable.
    Private,
    /// Not yet published.
    Draft,
    /// Awaiting review.
    Pending,
    /// Deleted.
    Trash,
}

/// Stock status for products that do not manage a stock count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    /// Available.
    #[default]
    InStock,
    /// Not available.
    OutOfStock,
    /// Available on backorder.
    OnBackorder,
}

fn default_true() -> bool {
    true
}

fn default_min_quantity() -> f64 {
    1.0
}

/// A catalog product as seen by the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier.
    pub id: ProductId,
    /// Parent product for variations.
    #[serde(default)]
    pub parent_id: Option<ProductId>,
    /// Display name.
    pub name: String,
    /// Structural type.
    #[serde(default)]
    pub kind: ProductKind,
    /// Publication status.
    #[serde(default)]
    pub status: ProductStatus,
    /// Whether the product can currently be bought, independent of stock.
    #[serde(default = "default_true")]
    pub purchasable: bool,
    /// Unit price before tax.
    #[serde(default)]
    pub price: Decimal,
    /// Whether `stock_quantity` is tracked.
    #[serde(default)]
    pub manage_stock: bool,
    /// Units on hand when stock is managed.
    #[serde(default)]
    pub stock_quantity: Option<f64>,
    /// Stock status when stock is not managed.
    #[serde(default)]
    pub stock_status: StockStatus,
    /// Whether orders may exceed the stock on hand.
    #[serde(default)]
    pub backorders_allowed: bool,
    /// Restricts the cart to a single unit of this product.
    #[serde(default)]
    pub sold_individually: bool,
    /// Minimum purchase quantity per line.
    #[serde(default = "default_min_quantity")]
    pub min_quantity: f64,
    /// Maximum purchase quantity per line; `None` means unlimited.
    #[serde(default)]
    pub max_quantity: Option<f64>,
    /// Variable products: attribute name to the allowed option values.
    #[serde(default)]
    pub variation_attributes: BTreeMap<String, Vec<String>>,
    /// Variations: attribute name to a fixed value, or `None` for "any".
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<String>>,
}

impl Product {
    /// Creates a live, purchasable simple product with unmanaged stock.
    #[must_use]
    pub fn simple(id: u64, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: ProductId::new(id),
            parent_id: None,
            name: name.into(),
            kind: ProductKind::Simple,
            status: ProductStatus::Publish,
            purchasable: true,
            price,
            manage_stock: false,
            stock_quantity: None,
            stock_status: StockStatus::InStock,
            backorders_allowed: false,
            sold_individually: false,
            min_quantity: 1.0,
            max_quantity: None,
            variation_attributes: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns `true` if the product exists for shopping purposes (not
    /// trashed, drafted or pending review).
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.status, ProductStatus::Publish | ProductStatus::Private)
    }

    /// Returns `true` when stock is counted and backorders are refused, so
    /// the stock count caps what may be bought.
    #[must_use]
    pub fn limits_by_stock(&self) -> bool {
        self.manage_stock && !self.backorders_allowed
    }

    /// Returns `true` if at least one unit can be bought right now.
    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        if self.manage_stock {
            self.backorders_allowed || self.stock_quantity.unwrap_or(0.0) > 0.0
        } else {
            self.stock_status != StockStatus::OutOfStock
        }
    }

    /// Effective upper bound for a single line, combining the declared
    /// maximum, the sold-individually flag, and stock on hand.
    #[must_use]
    pub fn max_purchase_quantity(&self) -> Option<f64> {
        if self.sold_individually {
            return Some(1.0);
        }
        let stock_cap = if self.limits_by_stock() {
            Some(self.stock_quantity.unwrap_or(0.0).max(0.0))
        } else {
            None
        };
        match (self.max_quantity, stock_cap) {
            (Some(max), Some(stock)) => Some(max.min(stock)),
            (Some(max), None) => Some(max),
            (None, cap) => cap,
        }
    }
}
