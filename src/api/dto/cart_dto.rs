//! Request bodies and query parameters for cart endpoints.
//!
//! Product ids and quantities arrive as JSON numbers or numeric strings;
//! anything else is rejected as invalid input before the cart is touched.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{ItemData, ProductId, VariationSelections};
use crate::error::CartError;
use crate::pricing::quantity_to_decimal;
use crate::validation::ItemCandidate;

/// Query parameters accepted by every cart endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartQuery {
    /// Explicit cart key, used when no `X-Cart-Key` header is sent.
    #[serde(default)]
    pub cart_key: Option<String>,
    /// Comma-separated top-level fields to return.
    #[serde(default)]
    pub fields: Option<String>,
}

/// Body of `POST /cart/add-item`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    /// Product or variation id.
    pub id: Value,
    /// Units to add; defaults to 1.
    #[serde(default)]
    pub quantity: Option<Value>,
    /// Attribute selections for variable products.
    #[serde(default)]
    pub variation: BTreeMap<String, Value>,
    /// Custom line data.
    #[serde(default)]
    pub item_data: ItemData,
    /// Respond with the added line instead of the whole cart.
    #[serde(default)]
    pub return_item: bool,
}

impl AddItemRequest {
    /// Converts the body into an item candidate.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidInput`] if the id or quantity is not
    /// numeric.
    pub fn to_candidate(&self) -> Result<ItemCandidate, CartError> {
        let product_id = parse_product_id(&self.id)?;
        let quantity = match &self.quantity {
            Some(value) => parse_quantity(value)?,
            None => 1.0,
        };
        let variation: VariationSelections = self
            .variation
            .iter()
            .map(|(name, value)| (name.clone(), scalar_to_string(value)))
            .collect();
        Ok(ItemCandidate {
            variation,
            item_data: self.item_data.clone(),
            ..ItemCandidate::new(product_id, quantity)
        })
    }
}

/// Body of `POST /cart/add-items`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddItemsRequest {
    /// Items to add, in order.
    pub items: Vec<AddItemRequest>,
}

impl AddItemsRequest {
    /// Converts every entry, failing on the first malformed one.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidInput`] for an empty list or a malformed
    /// entry.
    pub fn to_candidates(&self) -> Result<Vec<ItemCandidate>, CartError> {
        if self.items.is_empty() {
            return Err(CartError::invalid(
                "cart_no_items",
                "At least one item is required.",
            ));
        }
        self.items.iter().map(AddItemRequest::to_candidate).collect()
    }
}

/// Body of `POST /cart/item/{item_key}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemRequest {
    /// New absolute quantity; zero removes the line.
    pub quantity: Value,
}

impl UpdateItemRequest {
    /// Parses the quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidInput`] if it is not numeric.
    pub fn quantity(&self) -> Result<f64, CartError> {
        parse_quantity(&self.quantity)
    }
}

/// Body of `POST /cart/clear`. The body itself is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearRequest {
    /// Keep the removed-items history.
    #[serde(default)]
    pub keep_removed_items: bool,
}

fn parse_product_id(value: &Value) -> Result<ProductId, CartError> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
        .map(ProductId::new)
        .ok_or_else(|| CartError::invalid("cart_invalid_product_id", "Product ID must be numeric."))
}

fn parse_quantity(value: &Value) -> Result<f64, CartError> {
    let quantity = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    quantity
        .filter(|q: &f64| quantity_to_decimal(*q).is_some())
        .ok_or_else(|| CartError::invalid("cart_invalid_quantity", "Quantity must be numeric."))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(body: Value) -> AddItemRequest {
        let Ok(req) = serde_json::from_value(body) else {
            panic!("body should deserialize");
        };
        req
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let Ok(candidate) = request(json!({ "id": "12", "quantity": "2.5" })).to_candidate() else {
            panic!("numeric strings are valid");
        };
        assert_eq!(candidate.product_id, ProductId::new(12));
        assert!((candidate.quantity - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn quantity_defaults_to_one_and_variation_values_are_stringified() {
        let Ok(candidate) =
            request(json!({ "id": 3, "variation": { "size": 42, "color": "red" } })).to_candidate()
        else {
            panic!("valid body");
        };
        assert!((candidate.quantity - 1.0).abs() < f64::EPSILON);
        assert_eq!(candidate.variation.get("size").map(String::as_str), Some("42"));
    }

    #[test]
    fn non_numeric_values_are_invalid_input() {
        let Err(err) = request(json!({ "id": "mug" })).to_candidate() else {
            panic!("non-numeric id must fail");
        };
        assert_eq!(err.error_code(), "cart_invalid_product_id");

        let Err(err) = request(json!({ "id": 1, "quantity": "lots" })).to_candidate() else {
            panic!("non-numeric quantity must fail");
        };
        assert_eq!(err.error_code(), "cart_invalid_quantity");
    }

    #[test]
    fn quantities_outside_decimal_range_are_invalid_input() {
        for quantity in [json!(1e30), json!("-1e29")] {
            let Err(err) = request(json!({ "id": 1, "quantity": quantity })).to_candidate() else {
                panic!("{quantity} must be rejected");
            };
            assert_eq!(err.error_code(), "cart_invalid_quantity");
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        let Ok(req) = serde_json::from_value::<AddItemsRequest>(json!({ "items": [] })) else {
            panic!("body should deserialize");
        };
        assert!(req.to_candidates().is_err());
    }
}
