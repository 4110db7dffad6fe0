//! Process startup: load every artifact exactly once and assemble the
//! shared, read-only application state.
//!
//! Loading never fails as a whole. Each artifact's outcome lands in the
//! readiness report and only the capability it backs is switched off.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use data_loader::{
    ArtifactReport, ArtifactStatus, CatalogLoader, DemandTable, MetadataCatalog,
    SimilarityIndexStore,
};
use forecast::model::MODEL_INFO_FILE;
use forecast::{Forecaster, LoadedModel};

use crate::config::{ServiceConfig, EVENTS_FILE, METADATA_FILE};
use crate::demand::{DemandService, ForecastModel};
use crate::recommendations::RecommendationService;

/// Which operations can be served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub collaborative: bool,
    pub content: bool,
    pub catalog: bool,
    pub demand: bool,
    pub forecast: bool,
}

impl Capabilities {
    pub fn all(&self) -> bool {
        self.collaborative && self.content && self.catalog && self.demand && self.forecast
    }
}

/// Per-artifact load outcomes plus the capabilities they add up to
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub capabilities: Capabilities,
    pub artifacts: ArtifactReport,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.capabilities.all()
    }
}

/// Everything request handlers need, built before the listener binds
pub struct AppState {
    pub config: ServiceConfig,
    pub recommendations: RecommendationService,
    pub demand: DemandService,
    pub readiness: ReadinessReport,
}

impl AppState {
    /// Load all artifacts and raw data named by `config`
    #[instrument(skip_all, fields(models_dir = ?config.models_dir, dataset_dir = ?config.dataset_dir))]
    pub fn build(config: ServiceConfig) -> Self {
        let start = Instant::now();

        // Indices, demand table and forecast model are independent
        let ((store, mut report), ((demand, demand_report), (model, model_report))) = rayon::join(
            || SimilarityIndexStore::load(&config.models_dir),
            || {
                rayon::join(
                    || load_demand(&config),
                    || LoadedModel::load(&config.models_dir),
                )
            },
        );
        report.extend(demand_report);
        report.extend(model_report);

        // The catalog scan stops early once it has seen every mapped product
        let catalog = load_catalog(&config, &store, &mut report);

        let state = Self::from_parts(config, store, catalog, demand, model, report);
        info!(
            ready = state.readiness.is_ready(),
            capabilities = ?state.readiness.capabilities,
            "Startup finished in {:?}",
            start.elapsed()
        );
        state
    }

    /// Assemble from already loaded parts
    pub fn from_parts(
        config: ServiceConfig,
        store: SimilarityIndexStore,
        catalog: MetadataCatalog,
        demand: Option<DemandTable>,
        model: Option<LoadedModel>,
        mut artifacts: ArtifactReport,
    ) -> Self {
        let forecast_model = model.and_then(|loaded| {
            match Forecaster::new(loaded.regressor.clone(), &loaded.info.features) {
                Ok(forecaster) => Some(ForecastModel {
                    forecaster: Arc::new(forecaster),
                    info: Arc::new(loaded.info),
                }),
                Err(e) => {
                    warn!(error = %e, "Forecast model and sidecar disagree");
                    artifacts.set(MODEL_INFO_FILE, ArtifactStatus::Failed(e.to_string()));
                    None
                }
            }
        });

        let capabilities = Capabilities {
            collaborative: store.collaborative.is_some(),
            content: store.content.is_some(),
            catalog: !catalog.is_empty(),
            demand: demand.is_some(),
            forecast: demand.is_some() && forecast_model.is_some(),
        };

        let store = Arc::new(store);
        let catalog = Arc::new(catalog);
        let recommendations = RecommendationService::new(store, catalog.clone());
        let demand = DemandService::new(demand.map(Arc::new), catalog, forecast_model);

        Self {
            config,
            recommendations,
            demand,
            readiness: ReadinessReport {
                capabilities,
                artifacts,
            },
        }
    }
}

fn load_demand(config: &ServiceConfig) -> (Option<DemandTable>, ArtifactReport) {
    let mut report = ArtifactReport::new();
    let table = report.record(
        EVENTS_FILE,
        DemandTable::load_path(&config.events_path(), config.event_row_cap),
    );
    (table, report)
}

fn load_catalog(
    config: &ServiceConfig,
    store: &SimilarityIndexStore,
    report: &mut ArtifactReport,
) -> MetadataCatalog {
    report
        .record(METADATA_FILE, catalog_loader(config, store).load_path(&config.metadata_path()))
        .unwrap_or_default()
}

/// Scan targets are the mapped products only; demand-only products fall
/// back to their IDs as titles
fn catalog_loader(config: &ServiceConfig, store: &SimilarityIndexStore) -> CatalogLoader {
    CatalogLoader::new()
        .with_targets(store.known_ids().cloned())
        .with_scan_cap(config.metadata_scan_cap)
        .with_min_resolved(config.metadata_min_resolved)
        .with_fallback_rows(config.metadata_fallback_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{ContentIndex, CsrMatrix, IdMapping};
    use std::collections::HashMap;
    use std::io::Cursor;

    #[test]
    fn test_empty_directories_degrade_everything() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(ServiceConfig::new(dir.path(), dir.path()));

        assert!(!state.readiness.is_ready());
        let caps = state.readiness.capabilities;
        assert!(!caps.collaborative && !caps.content && !caps.demand && !caps.forecast);
        assert_eq!(
            state.readiness.artifacts.status(METADATA_FILE),
            Some(&ArtifactStatus::Missing)
        );
        assert_eq!(state.recommendations.stats().status, "not_loaded");
        assert_eq!(state.demand.stats().status, "not_loaded");
    }

    #[test]
    fn test_catalog_scan_stops_after_mapped_products() {
        let mapping = IdMapping::from_forward(HashMap::from([("P1".to_string(), 0)]));
        let content = ContentIndex::new(CsrMatrix::from_dense(&[vec![1.0, 0.0]]), mapping);
        let store = SimilarityIndexStore::new(None, Some(content));

        let mut config = ServiceConfig::default();
        config.metadata_min_resolved = 1;
        config.metadata_fallback_rows = 1;

        let lines = [
            r#"{"parent_asin": "P1", "title": "Stainless Steel Kettle"}"#,
            r#"{"parent_asin": "DEMAND_ONLY", "title": "Reviewed But Unmapped"}"#,
        ]
        .join("\n");
        let catalog = catalog_loader(&config, &store)
            .scan(Cursor::new(lines))
            .unwrap();

        assert!(catalog.contains("P1"));
        assert!(!catalog.contains("DEMAND_ONLY"));
    }
}
