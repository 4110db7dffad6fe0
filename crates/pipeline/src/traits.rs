//! Core traits for the display pipeline.
//!
//! This module defines the Filter trait that allows composable,
//! extensible filters to be applied to enriched recommendations.

use anyhow::Result;
use data_loader::ProductId;

use crate::enrich::RecommendedProduct;

/// What a filter may know about the request being served
#[derive(Debug, Clone)]
pub struct FilterContext {
    /// The product recommendations are being computed for
    pub query_product_id: ProductId,
}

impl FilterContext {
    pub fn new(query_product_id: impl Into<ProductId>) -> Self {
        Self {
            query_product_id: query_product_id.into(),
        }
    }
}

/// Core trait for filtering recommendations.
///
/// - `Send + Sync` so one pipeline can be shared by concurrent requests
/// - Filters take ownership of the Vec and return the survivors, in order
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    fn apply(
        &self,
        items: Vec<RecommendedProduct>,
        context: &FilterContext,
    ) -> Result<Vec<RecommendedProduct>>;
}
