//! HTTP routing.
//!
//! Handlers are thin: extract parameters, run the service call on the
//! blocking pool under the per-request budget, and serialize the result.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use data_loader::{ArtifactStatus, CategoryDemand, Product, WeeklyTotal};

use crate::bootstrap::{AppState, Capabilities};
use crate::demand::{DemandStatsResponse, ProductDemand, ProductForecast, TopProduct};
use crate::error::{Result, ServiceError};
use crate::params::{ForecastParams, LimitParams, PageParams, RecommendParams, SearchParams};
use crate::recommendations::{
    ProductListResponse, RecommendationResponse, RecommendationStats, SearchResponse,
};

pub type SharedState = Arc<AppState>;

/// The full API under `/api/v1`
pub fn router(state: SharedState) -> Router {
    let recommendations: Router<SharedState> = Router::new()
        .route("/stats", get(recommendation_stats))
        .route("/products", get(list_products))
        .route("/search", get(search_products))
        .route("/product/{asin}", get(product_details))
        .route("/collaborative/{asin}", get(collaborative))
        .route("/content/{asin}", get(content))
        .route("/hybrid/{asin}", get(hybrid));

    let demand: Router<SharedState> = Router::new()
        .route("/stats", get(demand_stats))
        .route("/top-products", get(top_products))
        .route("/product/{asin}", get(product_demand))
        .route("/overall-trend", get(overall_trend))
        .route("/categories", get(categories))
        .route("/forecast/{asin}", get(forecast));

    Router::new()
        .route("/api/v1/health", get(health))
        .nest("/api/v1/recommendations", recommendations)
        .nest("/api/v1/demand", demand)
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(state: SharedState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => warn!(?err, "Failed to listen for shutdown signal"),
    }
}

/// Run CPU-bound service work off the async workers, bounded by the budget
async fn run_blocking<T, F>(state: &SharedState, work: F) -> Result<T>
where
    F: FnOnce(&AppState) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let budget = state.config.request_timeout();
    let budget_ms = state.config.request_timeout_ms;
    let state = state.clone();
    let task = tokio::task::spawn_blocking(move || work(&state));

    match tokio::time::timeout(budget, task).await {
        Ok(joined) => joined?,
        Err(_) => {
            warn!(budget_ms, "Request exceeded its budget");
            Err(ServiceError::Timeout(budget_ms))
        }
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub capabilities: Capabilities,
    pub artifacts: BTreeMap<String, ArtifactStatus>,
    pub checked_at: String,
}

pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let readiness = &state.readiness;
    let ready = readiness.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        capabilities: readiness.capabilities,
        artifacts: readiness
            .artifacts
            .iter()
            .map(|(name, status)| (name.to_string(), status.clone()))
            .collect(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

// =============================================================================
// Recommendations
// =============================================================================

async fn recommendation_stats(State(state): State<SharedState>) -> Json<RecommendationStats> {
    Json(state.recommendations.stats())
}

async fn list_products(
    State(state): State<SharedState>,
    Query(params): Query<PageParams>,
) -> Result<Json<ProductListResponse>> {
    let page = run_blocking(&state, move |app| {
        app.recommendations.list_products(params.limit, params.offset)
    })
    .await?;
    Ok(Json(page))
}

async fn search_products(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let found = run_blocking(&state, move |app| {
        app.recommendations.search_products(&params.q, params.limit)
    })
    .await?;
    Ok(Json(found))
}

async fn product_details(
    State(state): State<SharedState>,
    Path(asin): Path<String>,
) -> Result<Json<Product>> {
    Ok(Json(state.recommendations.product_details(&asin)?))
}

async fn collaborative(
    State(state): State<SharedState>,
    Path(asin): Path<String>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendationResponse>> {
    let response = run_blocking(&state, move |app| {
        app.recommendations.collaborative(&asin, params.n)
    })
    .await?;
    Ok(Json(response))
}

async fn content(
    State(state): State<SharedState>,
    Path(asin): Path<String>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendationResponse>> {
    let response =
        run_blocking(&state, move |app| app.recommendations.content(&asin, params.n)).await?;
    Ok(Json(response))
}

async fn hybrid(
    State(state): State<SharedState>,
    Path(asin): Path<String>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendationResponse>> {
    let response = run_blocking(&state, move |app| {
        app.recommendations.hybrid(&asin, params.n, params.cf_weight)
    })
    .await?;
    Ok(Json(response))
}

// =============================================================================
// Demand
// =============================================================================

async fn demand_stats(State(state): State<SharedState>) -> Json<DemandStatsResponse> {
    Json(state.demand.stats())
}

async fn top_products(
    State(state): State<SharedState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<TopProduct>>> {
    Ok(Json(state.demand.top_products(params.limit)?))
}

async fn product_demand(
    State(state): State<SharedState>,
    Path(asin): Path<String>,
) -> Result<Json<ProductDemand>> {
    Ok(Json(state.demand.product_demand(&asin)?))
}

async fn overall_trend(State(state): State<SharedState>) -> Result<Json<Vec<WeeklyTotal>>> {
    Ok(Json(state.demand.overall_trend()?))
}

async fn categories(State(state): State<SharedState>) -> Result<Json<Vec<CategoryDemand>>> {
    let categories = run_blocking(&state, |app| app.demand.categories()).await?;
    Ok(Json(categories))
}

async fn forecast(
    State(state): State<SharedState>,
    Path(asin): Path<String>,
    Query(params): Query<ForecastParams>,
) -> Result<Json<ProductForecast>> {
    let forecast =
        run_blocking(&state, move |app| app.demand.forecast(&asin, params.weeks)).await?;
    Ok(Json(forecast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use data_loader::{ArtifactReport, MetadataCatalog, SimilarityIndexStore};

    fn empty_state() -> SharedState {
        Arc::new(AppState::from_parts(
            ServiceConfig::default(),
            SimilarityIndexStore::default(),
            MetadataCatalog::new(),
            None,
            None,
            ArtifactReport::new(),
        ))
    }

    #[tokio::test]
    async fn health_reports_degraded_without_artifacts() {
        let (status, Json(payload)) = health(State(empty_state())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert!(!payload.capabilities.collaborative);
    }

    #[tokio::test]
    async fn run_blocking_times_out() {
        let mut config = ServiceConfig::default();
        config.request_timeout_ms = 10;
        let state = Arc::new(AppState::from_parts(
            config,
            SimilarityIndexStore::default(),
            MetadataCatalog::new(),
            None,
            None,
            ArtifactReport::new(),
        ));

        let outcome = run_blocking(&state, |_| {
            std::thread::sleep(std::time::Duration::from_millis(200));
            Ok(())
        })
        .await;
        assert!(matches!(outcome, Err(ServiceError::Timeout(10))));
    }

    #[tokio::test]
    async fn not_ready_maps_to_503() {
        let outcome = run_blocking(&empty_state(), |app| {
            app.recommendations.collaborative("B01", 5)
        })
        .await;
        let err = outcome.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Models not loaded");
    }
}
