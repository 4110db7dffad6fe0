//! Filter to keep only products that can be shown with a picture.
//!
//! Recommendations without an image are never displayed. This is a
//! product decision, so a list may come back shorter than requested.

use crate::enrich::RecommendedProduct;
use crate::traits::{Filter, FilterContext};
use anyhow::Result;

/// Removes items whose product has no image reference
pub struct ImagePresenceFilter;

impl Filter for ImagePresenceFilter {
    fn name(&self) -> &str {
        "ImagePresenceFilter"
    }

    fn apply(
        &self,
        items: Vec<RecommendedProduct>,
        _context: &FilterContext,
    ) -> Result<Vec<RecommendedProduct>> {
        Ok(items.into_iter().filter(|item| item.product.has_image()).collect())
    }
}
