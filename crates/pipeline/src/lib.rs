//! Enrichment and display filtering of recommendation candidates.
//!
//! This crate provides:
//! - Enricher, which attaches catalog attributes to raw candidates
//! - Filter trait and implementations for display filtering
//! - FilterPipeline for composing filters
//!
//! ## Architecture
//! Candidates flow through two stages:
//! 1. The Enricher resolves each candidate in the metadata catalog
//!    (placeholder attributes when the product has no entry)
//! 2. Filters drop items that must not be displayed (the query product,
//!    products without an image)
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{Enricher, FilterContext, FilterPipeline};
//!
//! let enricher = Enricher::new(catalog.clone());
//! let pipeline = FilterPipeline::display();
//!
//! let enriched = enricher.enrich(&candidates);
//! let shown = pipeline.apply(enriched, &FilterContext::new("B00EXAMPLE"))?;
//! ```

pub mod enrich;
pub mod filter_pipeline;
pub mod filters;
pub mod traits;

// Re-export main types
pub use enrich::{Enricher, RecommendedProduct};
pub use filter_pipeline::FilterPipeline;
pub use traits::{Filter, FilterContext};
