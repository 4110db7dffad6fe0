//! Similarity index store.
//!
//! Holds everything the two recommenders read at request time:
//! - the collaborative nearest-neighbour index over the item-interaction matrix
//! - the content (text-vector) matrix
//! - one ID ↔ row mapping per strategy
//!
//! The two mappings are separate namespaces. A row index from one must
//! never be used to address the other matrix.

use crate::artifacts::{read_artifact, read_json, ArtifactReport};
use crate::error::{DataLoadError, Result};
use crate::matrix::CsrMatrix;
use crate::types::ProductId;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub const KNN_INDEX_FILE: &str = "knn_index.json";
pub const ITEM_USER_MATRIX_FILE: &str = "item_user_matrix.json";
pub const TFIDF_VECTORIZER_FILE: &str = "tfidf_vectorizer.json";
pub const TFIDF_MATRIX_FILE: &str = "tfidf_matrix.json";
pub const MAPPINGS_FILE: &str = "recommendation_mappings.json";

// =============================================================================
// ID Mapping
// =============================================================================

/// Bijection between product IDs and dense row indices of one matrix
#[derive(Debug, Clone, Default)]
pub struct IdMapping {
    to_row: HashMap<ProductId, usize>,
    to_id: HashMap<usize, ProductId>,
}

impl IdMapping {
    /// Build from an `id → row` map, the authoritative direction.
    ///
    /// If two IDs claim the same row, the lexicographically smaller ID
    /// keeps it so the result doesn't depend on hash order.
    pub fn from_forward(forward: HashMap<ProductId, usize>) -> Self {
        let mut entries: Vec<(ProductId, usize)> = forward.into_iter().collect();
        entries.sort();

        let mut mapping = Self::default();
        for (id, row) in entries {
            if mapping.to_id.contains_key(&row) {
                warn!(product_id = %id, row, "Duplicate row in mapping; keeping first ID");
                continue;
            }
            mapping.to_id.insert(row, id.clone());
            mapping.to_row.insert(id, row);
        }
        mapping
    }

    pub fn row(&self, id: &str) -> Option<usize> {
        self.to_row.get(id).copied()
    }

    pub fn id(&self, row: usize) -> Option<&ProductId> {
        self.to_id.get(&row)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.to_row.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.to_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_row.is_empty()
    }

    /// IDs ordered by row
    pub fn ids_by_row(&self) -> Vec<&ProductId> {
        let mut rows: Vec<(&usize, &ProductId)> = self.to_id.iter().collect();
        rows.sort_by_key(|(row, _)| **row);
        rows.into_iter().map(|(_, id)| id).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProductId> {
        self.to_row.keys()
    }

    /// Drop entries pointing past the end of a matrix with `rows` rows
    fn restrict_to(&mut self, rows: usize, artifact: &str) {
        let before = self.to_row.len();
        self.to_row.retain(|_, row| *row < rows);
        self.to_id.retain(|row, _| *row < rows);
        let dropped = before - self.to_row.len();
        if dropped > 0 {
            warn!(artifact, dropped, rows, "Mapping entries out of matrix range dropped");
        }
    }
}

/// `recommendation_mappings.json`; only the `*_to_idx` halves are read
#[derive(Debug, Default, Deserialize)]
struct RawMappings {
    #[serde(default)]
    product_to_idx: HashMap<ProductId, usize>,
    #[serde(default)]
    cb_product_to_idx: HashMap<ProductId, usize>,
}

// =============================================================================
// Nearest Neighbours
// =============================================================================

/// Exported nearest-neighbour model parameters
#[derive(Debug, Clone, Deserialize)]
pub struct NeighborIndexConfig {
    pub metric: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_neighbors")]
    pub n_neighbors: usize,
}

fn default_algorithm() -> String {
    "brute".to_string()
}

fn default_neighbors() -> usize {
    10
}

/// Brute-force cosine nearest-neighbour search over the interaction matrix
#[derive(Debug, Clone)]
pub struct CollaborativeIndex {
    pub config: NeighborIndexConfig,
    pub matrix: CsrMatrix,
    pub mapping: IdMapping,
}

impl CollaborativeIndex {
    pub fn new(config: NeighborIndexConfig, matrix: CsrMatrix, mut mapping: IdMapping) -> Result<Self> {
        if config.metric != "cosine" {
            return Err(DataLoadError::invalid_artifact(
                KNN_INDEX_FILE,
                format!("unsupported metric '{}'", config.metric),
            ));
        }
        mapping.restrict_to(matrix.rows(), MAPPINGS_FILE);
        Ok(Self { config, matrix, mapping })
    }

    /// The `k` rows closest to `row` as `(row, cosine distance)`, nearest
    /// first. The query row itself is included, normally at distance 0.
    pub fn kneighbors(&self, row: usize, k: usize) -> Vec<(usize, f32)> {
        let mut distances: Vec<(usize, f32)> = self
            .matrix
            .cosine_similarities(row)
            .into_iter()
            .enumerate()
            .map(|(r, sim)| (r, 1.0 - sim))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.truncate(k);
        distances
    }
}

#[derive(Debug, Clone)]
pub struct ContentIndex {
    pub matrix: CsrMatrix,
    pub mapping: IdMapping,
}

impl ContentIndex {
    pub fn new(matrix: CsrMatrix, mut mapping: IdMapping) -> Self {
        mapping.restrict_to(matrix.rows(), MAPPINGS_FILE);
        Self { matrix, mapping }
    }
}

/// Fitted text vectorizer. Only its size is used at serving time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextVectorizer {
    #[serde(default)]
    pub vocabulary: HashMap<String, usize>,
    #[serde(default)]
    pub idf: Vec<f32>,
}

impl TextVectorizer {
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Read-only similarity data for both strategies.
///
/// Either side may be absent when its artifacts failed to load; the other
/// keeps working.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndexStore {
    pub collaborative: Option<CollaborativeIndex>,
    pub content: Option<ContentIndex>,
    pub vectorizer: Option<TextVectorizer>,
}

impl SimilarityIndexStore {
    pub fn new(collaborative: Option<CollaborativeIndex>, content: Option<ContentIndex>) -> Self {
        Self {
            collaborative,
            content,
            vectorizer: None,
        }
    }

    /// Load every similarity artifact from `models_dir`.
    ///
    /// Never fails: each artifact's outcome goes into the returned report
    /// and a capability is only assembled when all of its parts loaded.
    pub fn load(models_dir: &Path) -> (Self, ArtifactReport) {
        info!("Loading similarity artifacts from {:?}", models_dir);
        let mut report = ArtifactReport::new();

        // The two matrices dominate load time; parse them in parallel
        let ((item_user, tfidf), (knn, mappings)) = rayon::join(
            || {
                rayon::join(
                    || load_matrix(models_dir, ITEM_USER_MATRIX_FILE),
                    || load_matrix(models_dir, TFIDF_MATRIX_FILE),
                )
            },
            || {
                rayon::join(
                    || read_json::<NeighborIndexConfig>(&models_dir.join(KNN_INDEX_FILE)),
                    || read_json::<RawMappings>(&models_dir.join(MAPPINGS_FILE)),
                )
            },
        );

        let knn = report.record(KNN_INDEX_FILE, knn);
        let item_user = report.record(ITEM_USER_MATRIX_FILE, item_user);
        let vectorizer = report.record(
            TFIDF_VECTORIZER_FILE,
            read_json::<TextVectorizer>(&models_dir.join(TFIDF_VECTORIZER_FILE)),
        );
        let tfidf = report.record(TFIDF_MATRIX_FILE, tfidf);
        let mappings = report.record(MAPPINGS_FILE, mappings);

        let (cf_mapping, cb_mapping) = match mappings {
            Some(raw) => (
                Some(IdMapping::from_forward(raw.product_to_idx)),
                Some(IdMapping::from_forward(raw.cb_product_to_idx)),
            ),
            None => (None, None),
        };

        let collaborative = match (knn, item_user, cf_mapping) {
            (Some(config), Some(matrix), Some(mapping)) => {
                match CollaborativeIndex::new(config, matrix, mapping) {
                    Ok(index) => Some(index),
                    Err(e) => {
                        report.record::<()>(KNN_INDEX_FILE, Err(e));
                        None
                    }
                }
            }
            _ => None,
        };
        let content = match (tfidf, cb_mapping) {
            (Some(matrix), Some(mapping)) => Some(ContentIndex::new(matrix, mapping)),
            _ => None,
        };

        info!(
            collaborative = collaborative.as_ref().map_or(0, |c| c.mapping.len()),
            content = content.as_ref().map_or(0, |c| c.mapping.len()),
            "Similarity store ready"
        );

        let store = Self {
            collaborative,
            content,
            vectorizer,
        };
        (store, report)
    }

    /// Every product ID either strategy knows about, used as catalog scan targets
    pub fn known_ids(&self) -> impl Iterator<Item = &ProductId> {
        let cf = self.collaborative.iter().flat_map(|c| c.mapping.ids());
        let cb = self.content.iter().flat_map(|c| c.mapping.ids());
        cf.chain(cb)
    }

    /// True when `id` is present in either mapping
    pub fn knows(&self, id: &str) -> bool {
        self.collaborative.as_ref().is_some_and(|c| c.mapping.contains(id))
            || self.content.as_ref().is_some_and(|c| c.mapping.contains(id))
    }
}

fn load_matrix(models_dir: &Path, file: &str) -> Result<CsrMatrix> {
    let bytes = read_artifact(&models_dir.join(file))?;
    CsrMatrix::from_json(file, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactStatus;
    use std::fs;

    fn mapping(ids: &[&str]) -> IdMapping {
        IdMapping::from_forward(
            ids.iter()
                .enumerate()
                .map(|(row, id)| (id.to_string(), row))
                .collect(),
        )
    }

    #[test]
    fn test_mapping_is_bidirectional() {
        let m = mapping(&["A", "B", "C"]);
        assert_eq!(m.row("B"), Some(1));
        assert_eq!(m.id(2).map(String::as_str), Some("C"));
        assert_eq!(m.ids_by_row(), vec!["A", "B", "C"]);
        assert!(m.row("Z").is_none());
    }

    #[test]
    fn test_kneighbors_includes_self_first() {
        let matrix = CsrMatrix::from_dense(&[
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.9, 0.0],
            vec![0.0, 0.0, 1.0],
        ]);
        let config = NeighborIndexConfig {
            metric: "cosine".into(),
            algorithm: "brute".into(),
            n_neighbors: 2,
        };
        let index = CollaborativeIndex::new(config, matrix, mapping(&["A", "B", "C"])).unwrap();
        let neighbors = index.kneighbors(0, 2);
        assert_eq!(neighbors[0].0, 0);
        assert!(neighbors[0].1.abs() < 1e-6);
        assert_eq!(neighbors[1].0, 1);
    }

    #[test]
    fn test_unsupported_metric_rejected() {
        let config = NeighborIndexConfig {
            metric: "euclidean".into(),
            algorithm: "brute".into(),
            n_neighbors: 2,
        };
        let matrix = CsrMatrix::from_dense(&[vec![1.0]]);
        assert!(CollaborativeIndex::new(config, matrix, mapping(&["A"])).is_err());
    }

    #[test]
    fn test_load_degrades_per_artifact() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(TFIDF_MATRIX_FILE),
            r#"{"shape":[2,2],"indptr":[0,1,2],"indices":[0,1],"data":[1.0,1.0]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(MAPPINGS_FILE),
            r#"{"product_to_idx":{"A":0},"cb_product_to_idx":{"A":0,"B":1}}"#,
        )
        .unwrap();
        fs::write(dir.path().join(ITEM_USER_MATRIX_FILE), "{not json").unwrap();

        let (store, report) = SimilarityIndexStore::load(dir.path());

        assert!(store.collaborative.is_none());
        assert_eq!(store.content.as_ref().unwrap().mapping.len(), 2);
        assert_eq!(report.status(KNN_INDEX_FILE), Some(&ArtifactStatus::Missing));
        assert!(matches!(
            report.status(ITEM_USER_MATRIX_FILE),
            Some(ArtifactStatus::Failed(_))
        ));
        assert!(report.is_loaded(TFIDF_MATRIX_FILE));
        assert!(store.knows("B"));
    }
}
