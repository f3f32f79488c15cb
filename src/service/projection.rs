//! Cart view served to clients.
//!
//! Money is rendered as fixed-point strings in the store currency's minor
//! unit precision. Clients may ask for a subset of top-level fields with a
//! comma-separated `fields` parameter.

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::ProductCatalog;
use crate::domain::{CartItemLine, CartKey, CartState, ItemData, ItemKey, ProductId, VariationSelections};
use crate::error::CartError;
use crate::pricing::line_total;

/// Currency settings for rendering amounts.
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyView {
    /// ISO 4217 code.
    pub code: String,
    /// Digits after the decimal point.
    pub decimals: u32,
}

/// One line as rendered for clients.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    /// Line identity.
    pub item_key: ItemKey,
    /// Product id.
    pub id: ProductId,
    /// Variation id, for variable products.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<ProductId>,
    /// Product name, empty if the product is gone from the catalog.
    pub name: String,
    /// Units in the line.
    pub quantity: f64,
    /// Unit price.
    pub price: String,
    /// Unit price times quantity.
    pub line_subtotal: String,
    /// Attribute selections.
    pub variation: VariationSelections,
    /// Custom line data.
    pub item_data: ItemData,
}

/// Totals as rendered for clients.
#[derive(Debug, Clone, Serialize)]
pub struct TotalsView {
    /// Line subtotal.
    pub subtotal: String,
    /// Tax on lines.
    pub subtotal_tax: String,
    /// Discounts.
    pub discount_total: String,
    /// Shipping.
    pub shipping_total: String,
    /// Fees.
    pub fee_total: String,
    /// All tax.
    pub total_tax: String,
    /// Payable.
    pub total: String,
}

/// Fee line as rendered for clients.
#[derive(Debug, Clone, Serialize)]
pub struct FeeView {
    /// Display name.
    pub name: String,
    /// Amount.
    pub amount: String,
    /// Whether tax applies.
    pub taxable: bool,
}

/// The cart document.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    /// Cart key.
    pub cart_key: CartKey,
    /// Digest of lines and totals.
    pub cart_hash: String,
    /// Currency settings.
    pub currency: CurrencyView,
    /// Active lines.
    pub items: Vec<ItemView>,
    /// Total units.
    pub item_count: f64,
    /// Removed lines available for restore.
    pub removed_items: Vec<ItemView>,
    /// Applied coupon codes.
    pub coupons: Vec<String>,
    /// Fee lines.
    pub fees: Vec<FeeView>,
    /// Chosen shipping methods.
    pub shipping_methods: Vec<String>,
    /// Totals.
    pub totals: TotalsView,
    /// Whether a payment is due at checkout.
    pub needs_payment: bool,
}

/// Builds [`CartView`] documents.
#[derive(Debug, Clone)]
pub struct CartProjector {
    catalog: Arc<dyn ProductCatalog>,
    currency: String,
    decimals: u32,
}

impl CartProjector {
    /// Creates a projector.
    #[must_use]
    pub fn new(catalog: Arc<dyn ProductCatalog>, currency: impl Into<String>, decimals: u32) -> Self {
        Self {
            catalog,
            currency: currency.into(),
            decimals,
        }
    }

    /// Renders the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the catalog is unreachable.
    pub async fn project(&self, key: &CartKey, state: &CartState) -> Result<CartView, CartError> {
        let mut items = Vec::with_capacity(state.items.len());
        for line in state.items.values() {
            items.push(self.item(line).await?);
        }
        let mut removed_items = Vec::with_capacity(state.removed_items.len());
        for line in state.removed_items.values() {
            removed_items.push(self.item(line).await?);
        }

        let totals = &state.totals;
        Ok(CartView {
            cart_key: key.clone(),
            cart_hash: state.content_hash(),
            currency: CurrencyView {
                code: self.currency.clone(),
                decimals: self.decimals,
            },
            items,
            item_count: state.item_count(),
            removed_items,
            coupons: state.applied_coupons.clone(),
            fees: state
                .fees
                .iter()
                .map(|fee| FeeView {
                    name: fee.name.clone(),
                    amount: self.money(fee.amount),
                    taxable: fee.taxable,
                })
                .collect(),
            shipping_methods: state.chosen_shipping_methods.clone(),
            totals: TotalsView {
                subtotal: self.money(totals.subtotal),
                subtotal_tax: self.money(totals.subtotal_tax),
                discount_total: self.money(totals.discount_total),
                shipping_total: self.money(totals.shipping_total),
                fee_total: self.money(totals.fee_total),
                total_tax: self.money(totals.total_tax),
                total: self.money(totals.total),
            },
            needs_payment: totals.total > Decimal::ZERO,
        })
    }

    /// Renders a single line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the catalog is unreachable,
    /// or [`CartError::InvalidInput`] if the line total overflows.
    pub async fn item(&self, line: &CartItemLine) -> Result<ItemView, CartError> {
        let product = self.catalog.product(line.stock_product_id()).await?;
        let name = product.as_ref().map(|p| p.name.clone()).unwrap_or_default();
        let price = line
            .unit_price_override
            .or_else(|| product.as_ref().map(|p| p.price))
            .unwrap_or(Decimal::ZERO);
        let line_subtotal = line_total(price, line.quantity)?;
        Ok(ItemView {
            item_key: line.item_key.clone(),
            id: line.product_id,
            variation_id: line.variation_id,
            name,
            quantity: line.quantity,
            price: self.money(price),
            line_subtotal: self.money(line_subtotal),
            variation: line.variation.clone(),
            item_data: line.item_data.clone(),
        })
    }

    fn money(&self, amount: Decimal) -> String {
        let mut rounded = amount.round_dp(self.decimals);
        rounded.rescale(self.decimals);
        rounded.to_string()
    }
}

/// Keeps only the requested top-level fields of a rendered document.
///
/// `fields` is a comma-separated list; blank entries are ignored and an
/// empty list returns the document unchanged.
#[must_use]
pub fn select_fields(document: serde_json::Value, fields: &str) -> serde_json::Value {
    let wanted: BTreeSet<&str> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if wanted.is_empty() {
        return document;
    }
    match document {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(key, _)| wanted.contains(key.as_str()))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::domain::Product;

    fn projector() -> CartProjector {
        let Ok(price) = Decimal::from_str("9.5") else {
            panic!("bad price");
        };
        let catalog = InMemoryCatalog::from_products([Product::simple(1, "Mug", price)]);
        CartProjector::new(Arc::new(catalog), "EUR", 2)
    }

    #[tokio::test]
    async fn renders_lines_with_fixed_precision_money() {
        let mut state = CartState::default();
        let line = CartItemLine::new(
            ProductId::new(1),
            None,
            2.0,
            VariationSelections::new(),
            ItemData::new(),
        );
        state.items.insert(line.item_key.clone(), line);

        let Ok(view) = projector().project(&CartKey::generate(), &state).await else {
            panic!("projection failed");
        };
        let Some(item) = view.items.first() else {
            panic!("one item expected");
        };
        assert_eq!(item.name, "Mug");
        assert_eq!(item.price, "9.50");
        assert_eq!(item.line_subtotal, "19.00");
        assert_eq!(view.totals.total, "0.00");
        assert_eq!(view.currency.code, "EUR");
    }

    #[test]
    fn field_selection_keeps_requested_keys() {
        let doc = json!({ "items": [], "totals": {}, "cart_key": "k" });
        assert_eq!(
            select_fields(doc.clone(), "items, totals"),
            json!({ "items": [], "totals": {} })
        );
        assert_eq!(select_fields(doc.clone(), " , "), doc);
    }
}
