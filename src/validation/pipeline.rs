//! Ordered item checks run before any line enters the cart.
//!
//! Stages short-circuit on the first failure:
//!
//! 1. pre-validate extensions
//! 2. existence
//! 3. purchasability
//! 4. variation matching
//! 5. quantity bounds on the resulting line
//! 6. sold individually
//! 7. stock, including other shoppers' reservations
//! 8. post-validate extensions

use std::sync::Arc;

use serde_json::json;

use super::Extensions;
use crate::catalog::{ProductCatalog, StockReservations};
use crate::domain::{
    CartItemLine, CartState, ItemData, ItemKey, Product, ProductId, ProductKind,
    VariationSelections,
};
use crate::error::{CartError, ErrorKind};
use crate::pricing::quantity_to_decimal;

const ATTRIBUTE_PREFIX: &str = "attribute_";

/// An item as requested by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCandidate {
    /// Product, or variation, to add.
    pub product_id: ProductId,
    /// Explicit variation id.
    pub variation_id: Option<ProductId>,
    /// Requested units.
    pub quantity: f64,
    /// Attribute selections.
    pub variation: VariationSelections,
    /// Custom line data.
    pub item_data: ItemData,
}

impl ItemCandidate {
    /// Candidate without variation or custom data.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: f64) -> Self {
        Self {
            product_id,
            variation_id: None,
            quantity,
            variation: VariationSelections::new(),
            item_data: ItemData::new(),
        }
    }

    /// Candidate that re-adds a previously removed line.
    #[must_use]
    pub fn from_line(line: &CartItemLine) -> Self {
        Self {
            product_id: line.product_id,
            variation_id: line.variation_id,
            quantity: line.quantity,
            variation: line.variation.clone(),
            item_data: line.item_data.clone(),
        }
    }
}

/// An item that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedItem {
    /// The parent (or simple) product.
    pub product: Product,
    /// Matched variation, for variable products.
    pub variation: Option<Product>,
    /// Normalised attribute selections.
    pub selections: VariationSelections,
    /// Units to add.
    pub quantity: f64,
    /// Custom line data.
    pub item_data: ItemData,
    /// Key of the line this item lands on.
    pub item_key: ItemKey,
}

impl ValidatedItem {
    /// The catalog entry whose stock and price apply.
    #[must_use]
    pub fn stock_product(&self) -> &Product {
        self.variation.as_ref().unwrap_or(&self.product)
    }

    /// Converts into a new cart line.
    #[must_use]
    pub fn into_line(self) -> CartItemLine {
        CartItemLine::new(
            self.product.id,
            self.variation.map(|v| v.id),
            self.quantity,
            self.selections,
            self.item_data,
        )
    }
}

/// Runs item checks against the catalog and reservations.
#[derive(Debug, Clone)]
pub struct ValidationPipeline {
    catalog: Arc<dyn ProductCatalog>,
    reservations: Arc<dyn StockReservations>,
    extensions: Extensions,
}

impl ValidationPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        reservations: Arc<dyn StockReservations>,
        extensions: Extensions,
    ) -> Self {
        Self {
            catalog,
            reservations,
            extensions,
        }
    }

    /// Registered extensions.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Validates adding `candidate` to `cart`. Bounds and stock are checked
    /// against the quantity the line will hold after merging with an
    /// existing line of the same item key.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's [`CartError`].
    pub async fn validate_add(
        &self,
        mut candidate: ItemCandidate,
        cart: &CartState,
    ) -> Result<ValidatedItem, CartError> {
        self.extensions.pre_validate(&mut candidate, cart)?;

        let ItemCandidate {
            product_id,
            variation_id,
            quantity,
            variation,
            item_data,
        } = candidate;

        let mut product = self.live_product(product_id).await?;
        let mut variation_id = variation_id;
        if product.kind == ProductKind::Variation {
            let Some(parent_id) = product.parent_id else {
                return Err(not_available());
            };
            if variation_id.is_none() {
                variation_id = Some(product.id);
            }
            product = self.live_product(parent_id).await?;
        }
        ensure_purchasable(&product)?;

        let (variation, selections) = if product.kind == ProductKind::Variable {
            let (matched, selections) = self
                .match_variation(&product, variation_id, normalize_selections(variation))
                .await?;
            ensure_purchasable(&matched)?;
            (Some(matched), selections)
        } else {
            (None, VariationSelections::new())
        };

        check_positive(quantity)?;
        let item_key = ItemKey::derive(
            product.id,
            variation.as_ref().map(|v| v.id),
            &selections,
            &item_data,
        );
        let item = ValidatedItem {
            product,
            variation,
            selections,
            quantity,
            item_data,
            item_key,
        };

        let stock_product = item.stock_product();
        let line_total = cart.line_quantity(&item.item_key) + quantity;
        check_bounds(stock_product, line_total)?;

        let in_cart = cart.quantity_of_product(stock_product.id, None);
        if stock_product.sold_individually && (quantity > 1.0 || in_cart > 0.0) {
            return Err(CartError::policy(
                "cart_product_sold_individually",
                format!(
                    "You cannot add another \"{}\" to your cart.",
                    stock_product.name
                ),
            ));
        }

        self.check_stock(stock_product, in_cart, quantity, None).await?;

        self.extensions.post_validate(&item, cart)?;
        Ok(item)
    }

    /// Validates setting an existing line to `quantity` units.
    ///
    /// Stock is counted against the other lines of the same product, so the
    /// line's own current quantity is not double-counted.
    ///
    /// # Errors
    ///
    /// Returns the first failing check's [`CartError`].
    pub async fn validate_quantity(
        &self,
        line: &CartItemLine,
        quantity: f64,
        cart: &CartState,
    ) -> Result<(), CartError> {
        let product = self.live_product(line.stock_product_id()).await?;
        ensure_purchasable(&product)?;
        check_positive(quantity)?;
        check_bounds(&product, quantity)?;

        if product.sold_individually && quantity > 1.0 {
            return Err(CartError::policy(
                "cart_product_sold_individually",
                format!(
                    "You can only have 1 \"{}\" in your cart.",
                    product.name
                ),
            ));
        }

        let in_other_lines = cart.quantity_of_product(product.id, Some(&line.item_key));
        self.check_stock(&product, in_other_lines, quantity, None).await
    }

    /// Largest quantity, at most the line's current one, that the line may
    /// hold next to the other lines of `cart`. `None` if no quantity passes
    /// (the product is gone, unpurchasable, or out of stock).
    ///
    /// Whole-unit lines stay whole.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the catalog or reservations
    /// are unreachable.
    pub async fn fit_quantity(
        &self,
        line: &CartItemLine,
        cart: &CartState,
    ) -> Result<Option<f64>, CartError> {
        if !self.is_available(line).await? {
            return Ok(None);
        }
        let Some(product) = self.catalog.product(line.stock_product_id()).await? else {
            return Ok(None);
        };

        let mut cap = line.quantity;
        if let Some(max) = product.max_quantity {
            cap = cap.min(max);
        }
        if product.sold_individually {
            cap = cap.min(1.0);
        }
        if product.limits_by_stock() {
            let in_other_lines = cart.quantity_of_product(product.id, Some(&line.item_key));
            let reserved = self.reservations.reserved_units(product.id, None).await?;
            let stock = product.stock_quantity.unwrap_or(0.0);
            cap = cap.min(stock - reserved.max(0.0) - in_other_lines);
        }
        if line.quantity.fract() == 0.0 {
            cap = cap.floor();
        }
        if cap <= 0.0 || cap < product.min_quantity {
            return Ok(None);
        }

        match self.validate_quantity(line, cap, cart).await {
            Ok(()) => Ok(Some(cap)),
            Err(err) if err.kind() == ErrorKind::StorageFailure => Err(err),
            Err(_) => Ok(None),
        }
    }

    /// Returns `true` if the line's product and variation still exist and
    /// can be bought.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the catalog is unreachable.
    pub async fn is_available(&self, line: &CartItemLine) -> Result<bool, CartError> {
        for id in [Some(line.product_id), line.variation_id].into_iter().flatten() {
            match self.catalog.product(id).await? {
                Some(product) if product.is_live() && product.purchasable => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Checks `requested` more units of `product` on top of `in_cart`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StockConflict`] when the product is out of stock,
    /// the cart would exceed stock on hand, or reservations held by other
    /// checkouts leave too little.
    pub async fn check_stock(
        &self,
        product: &Product,
        in_cart: f64,
        requested: f64,
        draft_order: Option<&str>,
    ) -> Result<(), CartError> {
        if !product.is_in_stock() {
            return Err(CartError::stock(
                "cart_product_out_of_stock",
                format!(
                    "You cannot add \"{}\" to the cart because the product is out of stock.",
                    product.name
                ),
                json!({ "product_id": product.id }),
            ));
        }
        if !product.limits_by_stock() {
            return Ok(());
        }

        let stock = product.stock_quantity.unwrap_or(0.0);
        let wanted = in_cart + requested;
        if wanted > stock {
            let message = if in_cart > 0.0 {
                format!(
                    "You cannot add that amount to the cart: we have {stock} \"{}\" in stock and you already have {in_cart} in your cart.",
                    product.name
                )
            } else {
                format!(
                    "You cannot add that amount of \"{}\" to the cart because there is not enough stock ({stock} remaining).",
                    product.name
                )
            };
            return Err(CartError::stock(
                "cart_not_enough_stock",
                message,
                json!({ "stock_quantity": stock, "in_cart": in_cart }),
            ));
        }

        let reserved = self
            .reservations
            .reserved_units(product.id, draft_order)
            .await?;
        let available = stock - reserved;
        if available < wanted {
            return Err(CartError::stock(
                "cart_product_reserved",
                format!(
                    "Sorry, we do not have enough \"{}\" in stock to fulfill your order right now. Please try again in a few minutes.",
                    product.name
                ),
                json!({ "stock_quantity": stock, "reserved": reserved, "available": available }),
            ));
        }
        Ok(())
    }

    async fn live_product(&self, id: ProductId) -> Result<Product, CartError> {
        match self.catalog.product(id).await? {
            Some(product) if product.is_live() => Ok(product),
            _ => Err(not_available()),
        }
    }

    async fn match_variation(
        &self,
        parent: &Product,
        variation_id: Option<ProductId>,
        selections: VariationSelections,
    ) -> Result<(Product, VariationSelections), CartError> {
        for (name, value) in &selections {
            if let Some(options) = parent.variation_attributes.get(name)
                && !options.iter().any(|option| option == value)
            {
                return Err(invalid_attribute_value(name, options));
            }
        }

        let variation_id = match variation_id {
            Some(id) => id,
            None => match self.catalog.find_variation(parent, &selections).await? {
                Some(id) => id,
                None => {
                    let missing: Vec<&str> = parent
                        .variation_attributes
                        .keys()
                        .filter(|name| !selections.contains_key(*name))
                        .map(String::as_str)
                        .collect();
                    if !missing.is_empty() {
                        return Err(missing_attributes(parent, &missing));
                    }
                    return Err(CartError::not_found(
                        "cart_no_matching_variation",
                        format!(
                            "No matching variation of \"{}\" for the selected attributes.",
                            parent.name
                        ),
                    ));
                }
            },
        };

        let variation = match self.catalog.product(variation_id).await? {
            Some(v)
                if v.kind == ProductKind::Variation
                    && v.parent_id == Some(parent.id)
                    && v.is_live() =>
            {
                v
            }
            _ => {
                return Err(CartError::not_found(
                    "cart_invalid_variation",
                    "This variation does not exist or is no longer available.",
                ));
            }
        };

        let mut normalized = VariationSelections::new();
        let mut missing = Vec::new();
        for (name, declared) in &variation.attributes {
            match (declared, selections.get(name)) {
                (Some(fixed), Some(chosen)) if fixed != chosen => {
                    return Err(invalid_attribute_value(name, std::slice::from_ref(fixed)));
                }
                (Some(fixed), _) => {
                    normalized.insert(name.clone(), fixed.clone());
                }
                (None, Some(chosen)) => {
                    normalized.insert(name.clone(), chosen.clone());
                }
                (None, None) => missing.push(name.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(missing_attributes(parent, &missing));
        }
        Ok((variation, normalized))
    }
}

fn not_available() -> CartError {
    CartError::not_found(
        "cart_invalid_product",
        "This product does not exist or is no longer available.",
    )
}

fn ensure_purchasable(product: &Product) -> Result<(), CartError> {
    if product.purchasable {
        return Ok(());
    }
    Err(CartError::policy(
        "cart_product_cannot_be_purchased",
        format!("Sorry, \"{}\" cannot be purchased.", product.name),
    ))
}

fn check_positive(quantity: f64) -> Result<(), CartError> {
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(CartError::policy(
            "cart_invalid_quantity",
            "Quantity must be a positive number.",
        ));
    }
    if quantity_to_decimal(quantity).is_none() {
        return Err(CartError::invalid(
            "cart_invalid_quantity",
            "Quantity is too large.",
        ));
    }
    Ok(())
}

fn check_bounds(product: &Product, quantity: f64) -> Result<(), CartError> {
    if quantity < product.min_quantity {
        return Err(CartError::policy(
            "cart_quantity_below_minimum",
            format!(
                "The minimum quantity of \"{}\" allowed in the cart is {}.",
                product.name, product.min_quantity
            ),
        ));
    }
    if let Some(max) = product.max_quantity
        && quantity > max
    {
        return Err(CartError::policy(
            "cart_quantity_above_maximum",
            format!(
                "The maximum quantity of \"{}\" allowed in the cart is {max}.",
                product.name
            ),
        ));
    }
    Ok(())
}

fn normalize_selections(selections: VariationSelections) -> VariationSelections {
    selections
        .into_iter()
        .map(|(name, value)| {
            let name = name
                .strip_prefix(ATTRIBUTE_PREFIX)
                .map_or_else(|| name.clone(), str::to_string);
            (name, value.trim().to_string())
        })
        .filter(|(_, value)| !value.is_empty())
        .collect()
}

fn invalid_attribute_value(name: &str, allowed: &[String]) -> CartError {
    CartError::invalid(
        "cart_invalid_variation_attribute",
        format!(
            "Invalid value posted for {name}. Allowed values: {}",
            allowed.join(", ")
        ),
    )
}

fn missing_attributes(parent: &Product, missing: &[&str]) -> CartError {
    let (verb, noun) = if missing.len() == 1 {
        ("is a", "field")
    } else {
        ("are", "fields")
    };
    CartError::invalid(
        "cart_missing_variation_data",
        format!(
            "Missing variation data for variable product \"{}\". {} {verb} required {noun}.",
            parent.name,
            join_names(missing)
        ),
    )
}

fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => (*only).to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::catalog::{InMemoryCatalog, InMemoryReservations};

    fn managed(id: u64, stock: f64) -> Product {
        let mut p = Product::simple(id, format!("Product {id}"), Decimal::TEN);
        p.manage_stock = true;
        p.stock_quantity = Some(stock);
        p
    }

    fn shirt() -> Vec<Product> {
        let mut parent = Product::simple(10, "Shirt", Decimal::TEN);
        parent.kind = ProductKind::Variable;
        parent.variation_attributes = [
            ("color".to_string(), vec!["red".to_string(), "blue".to_string()]),
            ("size".to_string(), vec!["s".to_string(), "m".to_string()]),
        ]
        .into_iter()
        .collect();

        let variation = |id: u64, color: &str| {
            let mut v = Product::simple(id, format!("Shirt {color}"), Decimal::TEN);
            v.kind = ProductKind::Variation;
            v.parent_id = Some(ProductId::new(10));
            v.attributes = [
                ("color".to_string(), Some(color.to_string())),
                ("size".to_string(), None),
            ]
            .into_iter()
            .collect();
            v
        };
        vec![parent, variation(11, "red"), variation(12, "blue")]
    }

    fn pipeline_with(products: Vec<Product>, reservations: InMemoryReservations) -> ValidationPipeline {
        ValidationPipeline::new(
            Arc::new(InMemoryCatalog::from_products(products)),
            Arc::new(reservations),
            Extensions::new(),
        )
    }

    fn pipeline(products: Vec<Product>) -> ValidationPipeline {
        pipeline_with(products, InMemoryReservations::new())
    }

    fn select(pairs: &[(&str, &str)]) -> VariationSelections {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn cart_with_line(line: &CartItemLine) -> CartState {
        let mut cart = CartState::default();
        cart.items.insert(line.item_key.clone(), line.clone());
        cart
    }

    fn cart_with(item: ValidatedItem) -> CartState {
        let mut cart = CartState::default();
        let line = item.into_line();
        cart.items.insert(line.item_key.clone(), line);
        cart
    }

    #[tokio::test]
    async fn unknown_and_trashed_products_are_not_found() {
        let mut trashed = Product::simple(2, "Old", Decimal::ONE);
        trashed.status = crate::domain::ProductStatus::Trash;
        let p = pipeline(vec![trashed]);
        for id in [1, 2] {
            let Err(err) = p
                .validate_add(ItemCandidate::new(ProductId::new(id), 1.0), &CartState::default())
                .await
            else {
                panic!("product {id} must be rejected");
            };
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn unpurchasable_product_is_a_policy_violation() {
        let mut p = Product::simple(1, "Sample", Decimal::ONE);
        p.purchasable = false;
        let Err(err) = pipeline(vec![p])
            .validate_add(ItemCandidate::new(ProductId::new(1), 1.0), &CartState::default())
            .await
        else {
            panic!("must be rejected");
        };
        assert_eq!(err.error_code(), "cart_product_cannot_be_purchased");
    }

    #[tokio::test]
    async fn quantity_bounds_apply_to_merged_line() {
        let mut p = Product::simple(1, "Mug", Decimal::ONE);
        p.max_quantity = Some(3.0);
        let p = pipeline(vec![p]);

        let Ok(first) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 2.0), &CartState::default())
            .await
        else {
            panic!("two mugs are allowed");
        };
        let cart = cart_with(first);
        let Err(err) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 2.0), &cart)
            .await
        else {
            panic!("four mugs exceed the maximum");
        };
        assert_eq!(err.error_code(), "cart_quantity_above_maximum");

        let Err(err) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 0.0), &cart)
            .await
        else {
            panic!("zero is not a valid quantity");
        };
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
    }

    #[tokio::test]
    async fn sold_individually_allows_a_single_unit() {
        let mut p = Product::simple(1, "Ticket", Decimal::ONE);
        p.sold_individually = true;
        let p = pipeline(vec![p]);

        let Err(err) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 2.0), &CartState::default())
            .await
        else {
            panic!("two units must be rejected");
        };
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);

        let Ok(one) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 1.0), &CartState::default())
            .await
        else {
            panic!("one unit is fine");
        };
        let cart = cart_with(one);
        let Err(err) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 1.0), &cart)
            .await
        else {
            panic!("a second unit must be rejected");
        };
        assert_eq!(err.error_code(), "cart_product_sold_individually");
    }

    #[tokio::test]
    async fn stock_counts_units_already_in_cart() {
        let p = pipeline(vec![managed(1, 3.0)]);
        let Ok(two) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 2.0), &CartState::default())
            .await
        else {
            panic!("two of three are available");
        };
        let cart = cart_with(two);
        let Err(err) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 2.0), &cart)
            .await
        else {
            panic!("four of three must be rejected");
        };
        assert_eq!(err.kind(), ErrorKind::StockConflict);
        assert_eq!(err.error_code(), "cart_not_enough_stock");
    }

    #[tokio::test]
    async fn reservations_by_other_checkouts_reduce_availability() {
        let reservations = InMemoryReservations::new();
        reservations.reserve(ProductId::new(1), "order-other", 3.0);
        let p = pipeline_with(vec![managed(1, 5.0)], reservations);

        let Ok(one) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 1.0), &CartState::default())
            .await
        else {
            panic!("one of two available units is fine");
        };
        let cart = cart_with(one);
        let Err(err) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 2.0), &cart)
            .await
        else {
            panic!("three units exceed the two unreserved");
        };
        assert_eq!(err.error_code(), "cart_product_reserved");

        let product = managed(1, 5.0);
        assert!(p.check_stock(&product, 1.0, 2.0, Some("order-other")).await.is_ok());
        assert!(p.check_stock(&product, 1.0, 2.0, Some("order-mine")).await.is_err());
    }

    #[tokio::test]
    async fn unrepresentable_quantity_is_invalid_input() {
        let Err(err) = pipeline(vec![Product::simple(1, "Mug", Decimal::ONE)])
            .validate_add(ItemCandidate::new(ProductId::new(1), 1e30), &CartState::default())
            .await
        else {
            panic!("quantity beyond decimal range must be rejected");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.error_code(), "cart_invalid_quantity");
    }

    #[tokio::test]
    async fn fit_quantity_cuts_lines_down_to_stock() {
        let reservations = InMemoryReservations::new();
        reservations.reserve(ProductId::new(1), "order-other", 1.0);
        let p = pipeline_with(vec![managed(1, 5.0)], reservations);

        let mut line = CartItemLine::new(
            ProductId::new(1),
            None,
            9.0,
            VariationSelections::new(),
            ItemData::new(),
        );
        let cart = cart_with_line(&line);
        let Ok(Some(fitted)) = p.fit_quantity(&line, &cart).await else {
            panic!("four units should fit");
        };
        assert!((fitted - 4.0).abs() < f64::EPSILON);

        line.quantity = 2.0;
        let Ok(Some(fitted)) = p.fit_quantity(&line, &cart_with_line(&line)).await else {
            panic!("line within stock fits unchanged");
        };
        assert!((fitted - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn fit_quantity_gives_up_on_out_of_stock() {
        let p = pipeline(vec![managed(1, 0.0)]);
        let line = CartItemLine::new(
            ProductId::new(1),
            None,
            2.0,
            VariationSelections::new(),
            ItemData::new(),
        );
        let Ok(None) = p.fit_quantity(&line, &cart_with_line(&line)).await else {
            panic!("nothing fits when stock is gone");
        };
    }

    #[tokio::test]
    async fn out_of_stock_is_rejected() {
        let mut p = Product::simple(1, "Mug", Decimal::ONE);
        p.stock_status = crate::domain::StockStatus::OutOfStock;
        let Err(err) = pipeline(vec![p])
            .validate_add(ItemCandidate::new(ProductId::new(1), 1.0), &CartState::default())
            .await
        else {
            panic!("must be rejected");
        };
        assert_eq!(err.error_code(), "cart_product_out_of_stock");
    }

    #[tokio::test]
    async fn variation_is_resolved_from_selections() {
        let p = pipeline(shirt());
        let candidate = ItemCandidate {
            variation: select(&[("attribute_color", "blue"), ("size", "m")]),
            ..ItemCandidate::new(ProductId::new(10), 1.0)
        };
        let Ok(item) = p.validate_add(candidate, &CartState::default()).await else {
            panic!("variation should match");
        };
        assert_eq!(item.variation.map(|v| v.id), Some(ProductId::new(12)));
        assert_eq!(item.selections, select(&[("color", "blue"), ("size", "m")]));
    }

    #[tokio::test]
    async fn fixed_attributes_are_filled_in_and_any_attributes_required() {
        let p = pipeline(shirt());
        let given_id = ItemCandidate {
            variation_id: Some(ProductId::new(11)),
            variation: select(&[("size", "s")]),
            ..ItemCandidate::new(ProductId::new(10), 1.0)
        };
        let Ok(item) = p.validate_add(given_id, &CartState::default()).await else {
            panic!("color should be filled in from the variation");
        };
        assert_eq!(item.selections, select(&[("color", "red"), ("size", "s")]));

        let missing_size = ItemCandidate::new(ProductId::new(11), 1.0);
        let Err(err) = p.validate_add(missing_size, &CartState::default()).await else {
            panic!("size must be required");
        };
        assert_eq!(err.error_code(), "cart_missing_variation_data");
        assert!(err.to_string().contains("size is a required field"));
    }

    #[tokio::test]
    async fn missing_attributes_are_reported_together() {
        let Err(err) = pipeline(shirt())
            .validate_add(ItemCandidate::new(ProductId::new(10), 1.0), &CartState::default())
            .await
        else {
            panic!("selections are required");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("color and size are required fields"));
    }

    #[tokio::test]
    async fn mismatched_attribute_names_allowed_values() {
        let p = pipeline(shirt());
        let candidate = ItemCandidate {
            variation_id: Some(ProductId::new(11)),
            variation: select(&[("color", "blue"), ("size", "s")]),
            ..ItemCandidate::new(ProductId::new(10), 1.0)
        };
        let Err(err) = p.validate_add(candidate, &CartState::default()).await else {
            panic!("blue does not match the red variation");
        };
        assert_eq!(err.error_code(), "cart_invalid_variation_attribute");
        assert!(err.to_string().contains("Allowed values: red"));

        let unknown = ItemCandidate {
            variation: select(&[("color", "green")]),
            ..ItemCandidate::new(ProductId::new(10), 1.0)
        };
        let Err(err) = p.validate_add(unknown, &CartState::default()).await else {
            panic!("green is not an option");
        };
        assert!(err.to_string().contains("Allowed values: red, blue"));
    }

    #[tokio::test]
    async fn quantity_update_excludes_own_line_from_stock() {
        let p = pipeline(vec![managed(1, 3.0)]);
        let Ok(two) = p
            .validate_add(ItemCandidate::new(ProductId::new(1), 2.0), &CartState::default())
            .await
        else {
            panic!("two of three are available");
        };
        let cart = cart_with(two);
        let Some(line) = cart.items.values().next() else {
            panic!("line missing");
        };
        assert!(p.validate_quantity(line, 3.0, &cart).await.is_ok());
        let Err(err) = p.validate_quantity(line, 4.0, &cart).await else {
            panic!("four of three must be rejected");
        };
        assert_eq!(err.kind(), ErrorKind::StockConflict);
    }

    #[test]
    fn names_are_joined_naturally() {
        assert_eq!(join_names(&["a"]), "a");
        assert_eq!(join_names(&["a", "b", "c"]), "a, b and c");
    }
}
