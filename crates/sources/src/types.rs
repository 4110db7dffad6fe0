//! Candidate types shared by the recommendation sources.

use data_loader::ProductId;
use serde::Serialize;
use std::fmt;

/// Which recommendation method produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Collaborative,
    Content,
    Hybrid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Collaborative => "collaborative",
            Strategy::Content => "content",
            Strategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A neighbour of the query product, before enrichment.
///
/// `similarity` is the raw cosine similarity rounded to 3 decimals, in
/// [-1, 1]. A candidate never refers to the product that was queried.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub product_id: ProductId,
    pub similarity: f64,
    pub strategy: Strategy,
}

impl Candidate {
    pub fn new(product_id: impl Into<ProductId>, similarity: f64, strategy: Strategy) -> Self {
        Self {
            product_id: product_id.into(),
            similarity,
            strategy,
        }
    }
}

/// Round to 3 decimal places
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
