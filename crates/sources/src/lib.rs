//! # Sources Crate
//!
//! Candidate generation for product recommendations.
//!
//! ## Components
//!
//! ### Collaborative Source
//! Item-based nearest neighbours over the item-interaction matrix:
//! - "Products reviewed by the same people as this one"
//!
//! ### Content Source
//! Cosine similarity between text vectors of product descriptions:
//! - "Products described like this one"
//!
//! Both read the same immutable [`data_loader::SimilarityIndexStore`] and
//! never return the queried product.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{CollaborativeSource, ContentSource};
//! use data_loader::SimilarityIndexStore;
//! use std::sync::Arc;
//!
//! let (store, _report) = SimilarityIndexStore::load(Path::new("models"));
//! let store = Arc::new(store);
//!
//! let collaborative = CollaborativeSource::new(store.clone());
//! let content = ContentSource::new(store.clone());
//!
//! let cf = collaborative.get_candidates("B00EXAMPLE", 12);
//! let cb = content.get_candidates("B00EXAMPLE", 12);
//! ```

pub mod collaborative;
pub mod content;
pub mod types;

pub use collaborative::CollaborativeSource;
pub use content::ContentSource;
pub use types::{round3, Candidate, Strategy};
