//! Data Transfer Objects for REST request serialization.
//!
//! Responses are rendered by [`crate::service::CartProjector`].

pub mod cart_dto;

pub use cart_dto::*;
