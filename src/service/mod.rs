//! Service layer: cart mutations and the client-facing projection.
//!
//! [`CartService`] validates and applies changes to an open session and
//! keeps totals current; [`CartProjector`] renders the result.

pub mod cart_service;
pub mod projection;

pub use cart_service::CartService;
pub use projection::{CartProjector, CartView, select_fields};
