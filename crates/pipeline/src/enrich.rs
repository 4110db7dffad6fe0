//! Enrichment: attach catalog attributes to raw candidates.

use data_loader::{MetadataCatalog, Product};
use rayon::prelude::*;
use serde::Serialize;
use sources::{Candidate, Strategy};
use std::sync::Arc;

/// A recommended product ready for display.
///
/// Single-strategy results carry `similarity`; fused results carry `score`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedProduct {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub method: Strategy,
}

impl RecommendedProduct {
    pub fn product_id(&self) -> &str {
        &self.product.id
    }
}

/// Resolves candidates against the metadata catalog.
///
/// Products missing from the catalog get placeholder attributes; they are
/// not dropped here, only by the display filters.
#[derive(Clone)]
pub struct Enricher {
    catalog: Arc<MetadataCatalog>,
}

impl Enricher {
    pub fn new(catalog: Arc<MetadataCatalog>) -> Self {
        Self { catalog }
    }

    pub fn product(&self, product_id: &str) -> Product {
        self.catalog
            .get(product_id)
            .cloned()
            .unwrap_or_else(|| Product::placeholder(product_id))
    }

    /// Enrich candidates in parallel, preserving their order
    pub fn enrich(&self, candidates: &[Candidate]) -> Vec<RecommendedProduct> {
        candidates
            .par_iter()
            .map(|candidate| RecommendedProduct {
                product: self.product(&candidate.product_id),
                similarity: Some(candidate.similarity),
                score: None,
                method: candidate.strategy,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_preserves_order_and_falls_back() {
        let catalog = MetadataCatalog::from_products(vec![Product {
            title: "Chef Knife".into(),
            image_url: Some("knife.jpg".into()),
            ..Product::placeholder("K1")
        }]);
        let enricher = Enricher::new(Arc::new(catalog));

        let enriched = enricher.enrich(&[
            Candidate::new("K1", 0.9, Strategy::Content),
            Candidate::new("K2", 0.5, Strategy::Content),
        ]);

        assert_eq!(enriched[0].product.title, "Chef Knife");
        assert_eq!(enriched[0].similarity, Some(0.9));
        assert_eq!(enriched[1].product.title, "Product K2");
        assert!(enriched[1].product.image_url.is_none());
    }

    #[test]
    fn test_serialization_shape() {
        let item = RecommendedProduct {
            product: Product::placeholder("X"),
            similarity: None,
            score: Some(0.42),
            method: Strategy::Hybrid,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["asin"], "X");
        assert_eq!(json["score"], 0.42);
        assert_eq!(json["method"], "hybrid");
        assert!(json.get("similarity").is_none());
    }
}
