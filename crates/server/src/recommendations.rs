//! # Recommendation Service
//!
//! Coordinates the recommendation flow for one request:
//! 1. Validate parameters and check the needed index loaded
//! 2. Generate candidates (collaborative, content, or both in parallel)
//! 3. Enrich with catalog attributes
//! 4. Apply the display filters
//! 5. Fuse (hybrid only) and truncate to `n`
//!
//! Everything here is synchronous and CPU-bound; the HTTP layer runs it on
//! the blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, instrument};

use data_loader::index::TextVectorizer;
use data_loader::{MetadataCatalog, Product, ProductId, SimilarityIndexStore};
use pipeline::{Enricher, FilterContext, FilterPipeline, RecommendedProduct};
use sources::{CollaborativeSource, ContentSource, Strategy};

use crate::error::{Result, ServiceError};
use crate::fusion;
use crate::params::{
    check_cf_weight, check_range, MIN_QUERY_CHARS, PRODUCT_PAGE, RECOMMENDATION_COUNT,
    SEARCH_LIMIT,
};

const MODELS_NOT_LOADED: &str = "Models not loaded";

/// Response for every recommendation strategy
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResponse {
    pub product_asin: ProductId,
    pub method: Strategy,
    pub source_product: Option<Product>,
    pub recommendations: Vec<RecommendedProduct>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<Product>,
    pub query: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationStats {
    pub status: &'static str,
    pub total_products: usize,
    pub products_with_content: usize,
    pub products_with_metadata: usize,
    pub vocabulary_size: usize,
    pub models_loaded: BTreeMap<&'static str, bool>,
}

/// Recommendation operations over the immutable index store and catalog
#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<SimilarityIndexStore>,
    catalog: Arc<MetadataCatalog>,
    collaborative: CollaborativeSource,
    content: ContentSource,
    enricher: Enricher,
    filters: Arc<FilterPipeline>,
}

impl RecommendationService {
    pub fn new(store: Arc<SimilarityIndexStore>, catalog: Arc<MetadataCatalog>) -> Self {
        Self {
            collaborative: CollaborativeSource::new(store.clone()),
            content: ContentSource::new(store.clone()),
            enricher: Enricher::new(catalog.clone()),
            filters: Arc::new(FilterPipeline::display()),
            store,
            catalog,
        }
    }

    /// "Customers who bought this also bought..."
    #[instrument(skip(self))]
    pub fn collaborative(&self, product_id: &str, n: usize) -> Result<RecommendationResponse> {
        check_range("n", n, RECOMMENDATION_COUNT)?;
        if !self.collaborative.is_ready() {
            return Err(ServiceError::NotReady(MODELS_NOT_LOADED.into()));
        }
        if !self.collaborative.knows(product_id) {
            return Err(ServiceError::product_not_found(product_id));
        }
        let items = self.collaborative_items(product_id, n)?;
        Ok(self.respond(product_id, Strategy::Collaborative, items))
    }

    /// "Similar products" by description text
    #[instrument(skip(self))]
    pub fn content(&self, product_id: &str, n: usize) -> Result<RecommendationResponse> {
        check_range("n", n, RECOMMENDATION_COUNT)?;
        if !self.content.is_ready() {
            return Err(ServiceError::NotReady(MODELS_NOT_LOADED.into()));
        }
        if !self.content.knows(product_id) {
            return Err(ServiceError::product_not_found(product_id));
        }
        let items = self.content_items(product_id, n)?;
        Ok(self.respond(product_id, Strategy::Content, items))
    }

    /// Weighted blend of both strategies; works with either side alone
    #[instrument(skip(self))]
    pub fn hybrid(
        &self,
        product_id: &str,
        n: usize,
        cf_weight: f64,
    ) -> Result<RecommendationResponse> {
        check_range("n", n, RECOMMENDATION_COUNT)?;
        check_cf_weight(cf_weight)?;
        if !self.collaborative.is_ready() && !self.content.is_ready() {
            return Err(ServiceError::NotReady(MODELS_NOT_LOADED.into()));
        }
        if !self.store.knows(product_id) {
            return Err(ServiceError::product_not_found(product_id));
        }

        let start = Instant::now();
        let pool = n * 2;
        let (cf_items, cb_items) = rayon::join(
            || self.collaborative_items(product_id, pool),
            || self.content_items(product_id, pool),
        );
        let (cf_items, cb_items) = (cf_items?, cb_items?);
        debug!(
            collaborative = cf_items.len(),
            content = cb_items.len(),
            "Hybrid candidate pools"
        );

        let fused = fusion::fuse(cf_items, cb_items, cf_weight, n);
        let fused = self
            .filters
            .apply(fused, &FilterContext::new(product_id))
            .context("Failed to filter hybrid recommendations")?;

        info!(
            "Hybrid recommendations for {}: {} items in {:?}",
            product_id,
            fused.len(),
            start.elapsed()
        );
        Ok(self.respond(product_id, Strategy::Hybrid, fused))
    }

    /// Catalog attributes for a product; placeholder attributes when only
    /// an index knows it
    pub fn product_details(&self, product_id: &str) -> Result<Product> {
        match self.catalog.get(product_id) {
            Some(product) => Ok(product.clone()),
            None if self.store.knows(product_id) => Ok(Product::placeholder(product_id)),
            None => Err(ServiceError::NotFound("Product not found".into())),
        }
    }

    /// Page through collaborative-index products that can be displayed
    pub fn list_products(&self, limit: usize, offset: usize) -> Result<ProductListResponse> {
        check_range("limit", limit, PRODUCT_PAGE)?;

        let displayable: Vec<&Product> = match &self.store.collaborative {
            Some(index) => index
                .mapping
                .ids_by_row()
                .into_iter()
                .filter_map(|id| self.catalog.get(id))
                .filter(|product| product.has_image())
                .collect(),
            None => Vec::new(),
        };

        let total = displayable.len();
        let products = displayable
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(ProductListResponse {
            products,
            total,
            offset,
            limit,
        })
    }

    /// Case-insensitive title search in catalog order
    pub fn search_products(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        check_range("limit", limit, SEARCH_LIMIT)?;
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(ServiceError::InvalidParameter(format!(
                "q must be at least {} characters",
                MIN_QUERY_CHARS
            )));
        }

        let results: Vec<Product> = self
            .catalog
            .search(query, limit)
            .into_iter()
            .cloned()
            .collect();
        Ok(SearchResponse {
            count: results.len(),
            query: query.to_string(),
            results,
        })
    }

    pub fn stats(&self) -> RecommendationStats {
        let collaborative = self.store.collaborative.as_ref();
        let content = self.store.content.as_ref();

        // Collaborative filtering is the primary strategy; content alone is partial
        let status = match (collaborative.is_some(), content.is_some()) {
            (true, _) => "ready",
            (false, true) => "partial",
            (false, false) => "not_loaded",
        };

        let models_loaded = BTreeMap::from([
            ("knn", collaborative.is_some()),
            ("item_user_matrix", collaborative.is_some()),
            ("tfidf", self.store.vectorizer.is_some()),
            ("tfidf_matrix", content.is_some()),
        ]);

        RecommendationStats {
            status,
            total_products: collaborative.map_or(0, |index| index.mapping.len()),
            products_with_content: content.map_or(0, |index| index.mapping.len()),
            products_with_metadata: self.catalog.len(),
            vocabulary_size: self
                .store
                .vectorizer
                .as_ref()
                .map_or(0, TextVectorizer::vocabulary_size),
            models_loaded,
        }
    }

    fn collaborative_items(&self, product_id: &str, n: usize) -> Result<Vec<RecommendedProduct>> {
        let candidates = self.collaborative.get_candidates(product_id, n);
        self.display(product_id, &candidates, n)
    }

    fn content_items(&self, product_id: &str, n: usize) -> Result<Vec<RecommendedProduct>> {
        let candidates = self.content.get_candidates(product_id, n);
        self.display(product_id, &candidates, n)
    }

    /// Enrich, filter and truncate one strategy's candidates
    fn display(
        &self,
        product_id: &str,
        candidates: &[sources::Candidate],
        n: usize,
    ) -> Result<Vec<RecommendedProduct>> {
        let enriched = self.enricher.enrich(candidates);
        let mut items = self
            .filters
            .apply(enriched, &FilterContext::new(product_id))
            .context("Failed to apply display filters")?;
        debug!(
            candidates = candidates.len(),
            displayable = items.len(),
            "Filtered candidates"
        );
        items.truncate(n);
        Ok(items)
    }

    fn respond(
        &self,
        product_id: &str,
        method: Strategy,
        recommendations: Vec<RecommendedProduct>,
    ) -> RecommendationResponse {
        RecommendationResponse {
            product_asin: product_id.to_string(),
            method,
            source_product: self.product_details(product_id).ok(),
            count: recommendations.len(),
            recommendations,
        }
    }
}
