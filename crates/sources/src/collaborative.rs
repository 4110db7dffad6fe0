//! Collaborative Source - item-based nearest neighbours
//!
//! "Products reviewed by the same people as this one"
//!
//! ## Algorithm
//! 1. Resolve the product's row in the collaborative mapping
//! 2. Ask the neighbour index for `n + 1` rows (the query is its own
//!    nearest neighbour at distance 0)
//! 3. Drop the query product, convert distance `d` to similarity `1 - d`
//! 4. Return up to `n` candidates, most similar first

use crate::types::{round3, Candidate, Strategy};
use data_loader::SimilarityIndexStore;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Generates candidates from the item-interaction neighbour index
#[derive(Clone)]
pub struct CollaborativeSource {
    /// Shared, read-only similarity data
    store: Arc<SimilarityIndexStore>,
}

impl CollaborativeSource {
    pub fn new(store: Arc<SimilarityIndexStore>) -> Self {
        Self { store }
    }

    /// True when the neighbour index, matrix and mapping all loaded
    pub fn is_ready(&self) -> bool {
        self.store.collaborative.is_some()
    }

    pub fn knows(&self, product_id: &str) -> bool {
        self.store
            .collaborative
            .as_ref()
            .is_some_and(|index| index.mapping.contains(product_id))
    }

    /// Up to `n` neighbours of `product_id`.
    ///
    /// Empty when the index isn't loaded or the product isn't mapped.
    #[instrument(skip(self))]
    pub fn get_candidates(&self, product_id: &str, n: usize) -> Vec<Candidate> {
        let Some(index) = self.store.collaborative.as_ref() else {
            return Vec::new();
        };
        let Some(row) = index.mapping.row(product_id) else {
            debug!("Product not in collaborative mapping");
            return Vec::new();
        };

        let candidates: Vec<Candidate> = index
            .kneighbors(row, n + 1)
            .into_iter()
            .filter(|&(neighbor, _)| neighbor != row)
            .filter_map(|(neighbor, distance)| {
                let id = index.mapping.id(neighbor)?;
                (id != product_id).then(|| {
                    Candidate::new(
                        id.clone(),
                        round3(1.0 - distance as f64),
                        Strategy::Collaborative,
                    )
                })
            })
            .take(n)
            .collect();

        debug!("Generated {} collaborative candidates", candidates.len());
        candidates
    }
}
