//! Item validation: the ordered pipeline and its extension hooks.

pub mod extension;
pub mod pipeline;

pub use extension::{CartExtension, Extensions, ItemDataLimit};
pub use pipeline::{ItemCandidate, ValidatedItem, ValidationPipeline};
