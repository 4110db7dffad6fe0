//! Filter implementations for the display pipeline.
//!
//! This module contains all the concrete filter implementations
//! that can be composed into a FilterPipeline.

pub mod exclude_products;
pub mod image_presence;

// Re-export for convenience
pub use exclude_products::ExcludeProductsFilter;
pub use image_presence::ImagePresenceFilter;
