//! Content Source - text-vector similarity
//!
//! Ranks every product in the content matrix by cosine similarity to the
//! query product's text vector and keeps the best `n`.
//!
//! The scan is linear in catalog size per request. That is fine for the
//! bounded catalogs this serves; a much larger catalog would need a
//! prebuilt approximate index instead.

use crate::types::{round3, Candidate, Strategy};
use data_loader::SimilarityIndexStore;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct ContentSource {
    store: Arc<SimilarityIndexStore>,
}

impl ContentSource {
    pub fn new(store: Arc<SimilarityIndexStore>) -> Self {
        Self { store }
    }

    pub fn is_ready(&self) -> bool {
        self.store.content.is_some()
    }

    pub fn knows(&self, product_id: &str) -> bool {
        self.store
            .content
            .as_ref()
            .is_some_and(|index| index.mapping.contains(product_id))
    }

    /// Up to `n` products whose text vectors are closest to `product_id`'s.
    ///
    /// The query product is excluded by identity, not by rank, so another
    /// product with an identical vector is still returned.
    #[instrument(skip(self))]
    pub fn get_candidates(&self, product_id: &str, n: usize) -> Vec<Candidate> {
        let Some(index) = self.store.content.as_ref() else {
            return Vec::new();
        };
        let Some(row) = index.mapping.row(product_id) else {
            debug!("Product not in content mapping");
            return Vec::new();
        };

        let similarities = index.matrix.cosine_similarities(row);
        let mut ranked: Vec<(usize, f32)> = similarities
            .into_iter()
            .enumerate()
            .filter(|&(r, _)| r != row)
            .collect();
        // Stable: equal similarities keep row order
        ranked.par_sort_by(|a, b| b.1.total_cmp(&a.1));

        let candidates: Vec<Candidate> = ranked
            .into_iter()
            .filter_map(|(r, sim)| {
                let id = index.mapping.id(r)?;
                (id != product_id)
                    .then(|| Candidate::new(id.clone(), round3(sim as f64), Strategy::Content))
            })
            .take(n)
            .collect();

        debug!("Generated {} content candidates", candidates.len());
        candidates
    }
}
