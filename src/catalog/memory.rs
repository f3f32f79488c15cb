//! In-process catalog loaded from a JSON file.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use super::ProductCatalog;
use crate::domain::{Product, ProductId, ProductKind, VariationSelections};
use crate::error::CartError;

/// Failure to load a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    /// The file could not be read.
    #[error("cannot read catalog file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a JSON array of products.
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Catalog held in memory, ordered by product id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: BTreeMap<ProductId, Product>,
}

impl InMemoryCatalog {
    /// Creates a catalog from a list of products. Later duplicates replace
    /// earlier ones.
    #[must_use]
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Loads a JSON array of products from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError`] if the file is missing or malformed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let raw = std::fs::read_to_string(path)?;
        let products: Vec<Product> = serde_json::from_str(&raw)?;
        Ok(Self::from_products(products))
    }

    /// Number of products, variations included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CartError> {
        Ok(self.products.get(&id).cloned())
    }

    async fn find_variation(
        &self,
        parent: &Product,
        selections: &VariationSelections,
    ) -> Result<Option<ProductId>, CartError> {
        let found = self
            .products
            .values()
            .filter(|p| p.kind == ProductKind::Variation && p.parent_id == Some(parent.id))
            .find(|variation| {
                variation
                    .attributes
                    .iter()
                    .all(|(name, value)| match value {
                        Some(fixed) => selections.get(name) == Some(fixed),
                        None => true,
                    })
            })
            .map(|variation| variation.id);
        Ok(found)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn variation(id: u64, parent: u64, attrs: &[(&str, Option<&str>)]) -> Product {
        let mut p = Product::simple(id, format!("Variation {id}"), Decimal::ONE);
        p.kind = ProductKind::Variation;
        p.parent_id = Some(ProductId::new(parent));
        p.attributes = attrs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.map(str::to_string)))
            .collect();
        p
    }

    fn shirt() -> Product {
        let mut p = Product::simple(10, "Shirt", Decimal::ONE);
        p.kind = ProductKind::Variable;
        p
    }

    fn select(pairs: &[(&str, &str)]) -> VariationSelections {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn finds_variation_by_fixed_attributes() {
        let catalog = InMemoryCatalog::from_products([
            shirt(),
            variation(11, 10, &[("color", Some("red")), ("size", None)]),
            variation(12, 10, &[("color", Some("blue")), ("size", None)]),
        ]);
        let Ok(found) = catalog
            .find_variation(&shirt(), &select(&[("color", "blue"), ("size", "l")]))
            .await
        else {
            panic!("lookup failed");
        };
        assert_eq!(found, Some(ProductId::new(12)));

        let Ok(none) = catalog
            .find_variation(&shirt(), &select(&[("color", "green")]))
            .await
        else {
            panic!("lookup failed");
        };
        assert_eq!(none, None);
    }

    #[test]
    fn loads_from_json_file() {
        let path = std::env::temp_dir().join(format!("catalog-{}.json", uuid::Uuid::new_v4()));
        let written = std::fs::write(
            &path,
            r#"[{"id": 1, "name": "Mug", "price": "9.99"}, {"id": 2, "name": "Tee", "price": 15}]"#,
        );
        assert!(written.is_ok());
        let Ok(catalog) = InMemoryCatalog::from_json_file(&path) else {
            panic!("catalog should load");
        };
        assert_eq!(catalog.len(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = InMemoryCatalog::from_json_file("/nonexistent/catalog.json");
        assert!(matches!(result, Err(CatalogLoadError::Io(_))));
    }
}
