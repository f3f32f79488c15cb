//! Cart session lifecycle: load on demand, renew, migrate, save once.

pub mod cart_session;
pub mod manager;

pub use cart_session::CartSession;
pub use manager::{SessionManager, SessionReceipt};
