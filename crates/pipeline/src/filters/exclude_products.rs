//! Filter to remove specific products, always including the query itself.

use crate::enrich::RecommendedProduct;
use crate::traits::{Filter, FilterContext};
use anyhow::Result;
use data_loader::ProductId;
use std::collections::HashSet;

/// Removes the queried product plus any explicitly excluded IDs.
///
/// The sources already skip the query product; this keeps fused and
/// re-ranked lists honest too.
#[derive(Default)]
pub struct ExcludeProductsFilter {
    excluded: HashSet<ProductId>,
}

impl ExcludeProductsFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_excluded(mut self, ids: impl IntoIterator<Item = ProductId>) -> Self {
        self.excluded.extend(ids);
        self
    }
}

impl Filter for ExcludeProductsFilter {
    fn name(&self) -> &str {
        "ExcludeProductsFilter"
    }

    fn apply(
        &self,
        items: Vec<RecommendedProduct>,
        context: &FilterContext,
    ) -> Result<Vec<RecommendedProduct>> {
        Ok(items
            .into_iter()
            .filter(|item| {
                item.product_id() != context.query_product_id
                    && !self.excluded.contains(item.product_id())
            })
            .collect())
    }
}
