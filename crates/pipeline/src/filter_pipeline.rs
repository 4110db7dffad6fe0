//! The FilterPipeline orchestrates multiple filters.
//!
//! This module provides the main FilterPipeline struct that chains
//! multiple filters together using the builder pattern.

use crate::enrich::RecommendedProduct;
use crate::filters::{ExcludeProductsFilter, ImagePresenceFilter};
use crate::traits::{Filter, FilterContext};
use anyhow::Result;

/// Chains multiple filters together into a processing pipeline.
///
/// ## Usage
/// ```ignore
/// let pipeline = FilterPipeline::new()
///     .add_filter(ExcludeProductsFilter::new())
///     .add_filter(ImagePresenceFilter);
///
/// let shown = pipeline.apply(enriched, &FilterContext::new(product_id))?;
/// ```
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    /// Create a new empty FilterPipeline.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// The filters every recommendation list goes through before display
    pub fn display() -> Self {
        Self::new()
            .add_filter(ExcludeProductsFilter::new())
            .add_filter(ImagePresenceFilter)
    }

    /// Add a filter to the pipeline (builder pattern).
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply all filters in sequence, stopping at the first error
    pub fn apply(
        &self,
        items: Vec<RecommendedProduct>,
        context: &FilterContext,
    ) -> Result<Vec<RecommendedProduct>> {
        let mut current = items;
        for filter in &self.filters {
            let before = current.len();
            current = filter.apply(current, context)?;
            tracing::debug!(
                filter = filter.name(),
                before,
                after = current.len(),
                "Applied filter"
            );
        }
        Ok(current)
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}
