//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{CartProjector, CartService};
use crate::session::SessionManager;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session lifecycle: identity, load, save.
    pub sessions: Arc<SessionManager>,
    /// Cart mutations.
    pub carts: Arc<CartService>,
    /// Response rendering.
    pub projector: Arc<CartProjector>,
}
