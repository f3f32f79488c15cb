//! Domain layer: cart identity, cart contents, persisted records and the
//! product model the cart validates against.
//!
//! Everything here is plain data with small invariant-preserving helpers;
//! orchestration lives in [`crate::session`] and [`crate::service`].

pub mod cart_key;
pub mod cart_line;
pub mod cart_record;
pub mod cart_state;
pub mod product;

pub use cart_key::CartKey;
pub use cart_line::{CartItemLine, ItemData, ItemKey, RemovedItemLine, VariationSelections};
pub use cart_record::{CartRecord, ExpiryPolicy};
pub use cart_state::{CartState, CartTotals, FeeLine};
pub use product::{Product, ProductId, ProductKind, ProductStatus, StockStatus};
