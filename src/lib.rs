//! # cart-gateway
//!
//! Headless REST gateway for shopping carts.
//!
//! Every request is resolved to a cart key (bearer token, explicit key,
//! signed guest cookie, or a freshly generated key), the cart is loaded
//! from durable storage, one operation runs against it, and the result is
//! persisted before the response is rendered. Products and stock are owned
//! by an external catalog; the gateway only reads them.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SessionManager (session/) ── IdentityResolver (identity/)
//!     ├── CartService (service/)
//!     │       ├── ValidationPipeline (validation/)
//!     │       └── PricingEngine (pricing)
//!     │
//!     ├── ProductCatalog, StockReservations (catalog/)
//!     │
//!     └── CachedCartStore (persistence/)
//!             ├── CartCache (in-process)
//!             └── PostgreSQL / in-memory store
//! ```

pub mod api;
pub mod app_state;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod pricing;
pub mod service;
pub mod session;
pub mod validation;
