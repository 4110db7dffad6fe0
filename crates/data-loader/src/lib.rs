//! # Data Loader Crate
//!
//! Loads every read-only input the shopsense services depend on.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Product, WeekKey, demand records)
//! - **parser**: Tolerant NDJSON parsing of product metadata and review events
//! - **catalog**: Product ID → normalized product, filled by a bounded scan
//! - **matrix**: Sparse CSR matrices with row-wise cosine similarity
//! - **index**: Similarity index store (neighbour index, content matrix, ID mappings)
//! - **demand**: Weekly demand table, summaries and trend classification
//! - **artifacts**: Per-artifact load status for readiness reporting
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{CatalogLoader, SimilarityIndexStore};
//! use std::path::Path;
//!
//! let (store, report) = SimilarityIndexStore::load(Path::new("models"));
//! let catalog = CatalogLoader::new()
//!     .with_targets(store.known_ids().cloned())
//!     .load_path(Path::new("data/meta_Home_and_Kitchen.jsonl"))?;
//!
//! println!("{} products in catalog", catalog.len());
//! ```

pub mod artifacts;
pub mod catalog;
pub mod demand;
pub mod error;
pub mod index;
pub mod matrix;
pub mod parser;
pub mod types;

pub use artifacts::{ArtifactReport, ArtifactStatus};
pub use catalog::{CatalogLoader, MetadataCatalog};
pub use demand::{classify_trend, CategoryDemand, DemandStats, DemandTable, WeeklyTotal};
pub use error::{DataLoadError, Result};
pub use index::{CollaborativeIndex, ContentIndex, IdMapping, SimilarityIndexStore};
pub use matrix::CsrMatrix;
pub use types::{
    Product, ProductDemandSummary, ProductId, ReviewEvent, Trend, WeekKey, WeeklyDemandRecord,
};
