//! Totals computation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::catalog::ProductCatalog;
use crate::domain::{CartItemLine, CartState, CartTotals};
use crate::error::CartError;

/// Computes cart totals from the current lines, fees and coupons.
#[async_trait]
pub trait PricingEngine: Send + Sync + fmt::Debug {
    /// Returns fresh totals for `state`. Does not modify the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if prices cannot be looked up,
    /// or [`CartError::InvalidInput`] if an amount overflows.
    async fn recompute(&self, state: &CartState) -> Result<CartTotals, CartError>;
}

/// Prices lines from the catalog and applies one flat tax rate.
///
/// Coupons are carried on the cart but not evaluated, so the discount total
/// is always zero. Shipping is quoted elsewhere and stays at zero.
#[derive(Debug, Clone)]
pub struct CatalogPricing {
    catalog: Arc<dyn ProductCatalog>,
    tax_rate: Decimal,
    decimals: u32,
}

impl CatalogPricing {
    /// Creates a pricing engine. `tax_rate` is a fraction (`0.2` for 20%);
    /// results are rounded to `decimals` places.
    #[must_use]
    pub fn new(catalog: Arc<dyn ProductCatalog>, tax_rate: Decimal, decimals: u32) -> Self {
        Self {
            catalog,
            tax_rate,
            decimals,
        }
    }

    async fn unit_price(&self, line: &CartItemLine) -> Result<Decimal, CartError> {
        if let Some(price) = line.unit_price_override {
            return Ok(price);
        }
        let product = self.catalog.product(line.stock_product_id()).await?;
        Ok(product.map_or(Decimal::ZERO, |p| p.price))
    }
}

#[async_trait]
impl PricingEngine for CatalogPricing {
    async fn recompute(&self, state: &CartState) -> Result<CartTotals, CartError> {
        let mut subtotal = Decimal::ZERO;
        for line in state.items.values() {
            let line_total = line_total(self.unit_price(line).await?, line.quantity)?;
            subtotal = checked(subtotal.checked_add(line_total))?;
        }

        let mut fee_total = Decimal::ZERO;
        let mut taxable_fees = Decimal::ZERO;
        for fee in &state.fees {
            fee_total = checked(fee_total.checked_add(fee.amount))?;
            if fee.taxable {
                taxable_fees = checked(taxable_fees.checked_add(fee.amount))?;
            }
        }

        let subtotal_tax = checked(subtotal.checked_mul(self.tax_rate))?.round_dp(self.decimals);
        let fee_tax = checked(taxable_fees.checked_mul(self.tax_rate))?.round_dp(self.decimals);
        let total_tax = checked(subtotal_tax.checked_add(fee_tax))?;
        let discount_total = Decimal::ZERO;
        let shipping_total = Decimal::ZERO;
        let total = checked(
            subtotal
                .checked_add(fee_total)
                .and_then(|t| t.checked_add(shipping_total))
                .and_then(|t| t.checked_sub(discount_total))
                .and_then(|t| t.checked_add(total_tax)),
        )?;

        Ok(CartTotals {
            subtotal: subtotal.round_dp(self.decimals),
            subtotal_tax,
            discount_total,
            shipping_total,
            fee_total: fee_total.round_dp(self.decimals),
            total_tax,
            total: total.round_dp(self.decimals),
        })
    }
}

/// Converts a line quantity to a [`Decimal`]. `None` for values outside the
/// decimal range (or not finite).
#[must_use]
pub fn quantity_to_decimal(quantity: f64) -> Option<Decimal> {
    Decimal::from_f64(quantity)
}

/// Unit price times quantity.
///
/// # Errors
///
/// Returns [`CartError::InvalidInput`] if the quantity cannot be
/// represented or the product overflows.
pub fn line_total(unit_price: Decimal, quantity: f64) -> Result<Decimal, CartError> {
    checked(quantity_to_decimal(quantity).and_then(|q| unit_price.checked_mul(q)))
}

fn checked(amount: Option<Decimal>) -> Result<Decimal, CartError> {
    amount.ok_or_else(|| {
        CartError::invalid(
            "cart_amount_out_of_range",
            "The cart total is too large to compute.",
        )
    })
}
