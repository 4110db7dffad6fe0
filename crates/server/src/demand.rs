//! Demand analytics and per-product forecasts.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use data_loader::parser::truncate_chars;
use data_loader::{
    classify_trend, CategoryDemand, DemandTable, MetadataCatalog, ProductId, Trend, WeekKey,
    WeeklyTotal,
};
use forecast::{round2, ForecastPoint, Forecaster, ModelInfo};

use crate::error::{Result, ServiceError};
use crate::params::{check_range, FORECAST_WEEKS, TOP_PRODUCTS_LIMIT};

/// Stated in every stats response; demand is not measured directly
pub const DEMAND_ASSUMPTION: &str = "Review count used as proxy for demand";

const TITLE_KEEP_CHARS: usize = 60;
/// Historical weeks shown next to a forecast
const FORECAST_CONTEXT_WEEKS: usize = 12;

#[derive(Debug, Clone, Serialize)]
pub struct TimeRange {
    pub start: Option<WeekKey>,
    pub end: Option<WeekKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemandStatsResponse {
    pub status: &'static str,
    pub total_products: usize,
    pub total_weeks: usize,
    pub total_demand: u64,
    pub time_range: TimeRange,
    pub assumption: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub asin: ProductId,
    pub title: String,
    pub total_demand: u64,
    pub avg_weekly_demand: f64,
    pub num_weeks: usize,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesPoint {
    pub week: WeekKey,
    pub demand: f64,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDemand {
    pub asin: ProductId,
    pub title: String,
    pub total_demand: u64,
    pub avg_demand: f64,
    pub max_demand: u32,
    pub min_demand: u32,
    pub trend: Trend,
    pub time_series: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductForecast {
    pub asin: ProductId,
    pub title: String,
    pub model_type: String,
    pub model_mae: f64,
    pub forecast_weeks: usize,
    pub historical: Vec<ForecastPoint>,
    pub forecast: Vec<ForecastPoint>,
    pub combined: Vec<ForecastPoint>,
}

/// A forecaster together with the sidecar it was built from
#[derive(Clone)]
pub struct ForecastModel {
    pub forecaster: Arc<Forecaster>,
    pub info: Arc<ModelInfo>,
}

/// Read-only demand views over the weekly table
#[derive(Clone)]
pub struct DemandService {
    table: Option<Arc<DemandTable>>,
    catalog: Arc<MetadataCatalog>,
    model: Option<ForecastModel>,
}

impl DemandService {
    pub fn new(
        table: Option<Arc<DemandTable>>,
        catalog: Arc<MetadataCatalog>,
        model: Option<ForecastModel>,
    ) -> Self {
        Self {
            table,
            catalog,
            model,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.table.is_some()
    }

    pub fn can_forecast(&self) -> bool {
        self.table.is_some() && self.model.is_some()
    }

    fn table(&self) -> Result<&DemandTable> {
        self.table
            .as_deref()
            .ok_or_else(|| ServiceError::NotReady("Demand data not loaded".into()))
    }

    fn title(&self, product_id: &str) -> String {
        self.catalog
            .get(product_id)
            .map(|product| product.title.clone())
            .unwrap_or_else(|| product_id.to_string())
    }

    /// Never fails; reports `not_loaded` with zeroed figures instead
    pub fn stats(&self) -> DemandStatsResponse {
        let Some(table) = self.table.as_deref() else {
            return DemandStatsResponse {
                status: "not_loaded",
                total_products: 0,
                total_weeks: 0,
                total_demand: 0,
                time_range: TimeRange {
                    start: None,
                    end: None,
                },
                assumption: DEMAND_ASSUMPTION,
            };
        };
        let stats = table.stats();
        DemandStatsResponse {
            status: "ready",
            total_products: stats.total_products,
            total_weeks: stats.total_weeks,
            total_demand: stats.total_demand,
            time_range: TimeRange {
                start: stats.first_week,
                end: stats.last_week,
            },
            assumption: DEMAND_ASSUMPTION,
        }
    }

    pub fn top_products(&self, limit: usize) -> Result<Vec<TopProduct>> {
        check_range("limit", limit, TOP_PRODUCTS_LIMIT)?;
        let table = self.table()?;
        Ok(table
            .top_products(limit)
            .iter()
            .map(|summary| TopProduct {
                asin: summary.product_id.clone(),
                title: truncate_chars(
                    &self.title(&summary.product_id),
                    TITLE_KEEP_CHARS,
                    TITLE_KEEP_CHARS,
                ),
                total_demand: summary.total_demand,
                avg_weekly_demand: round2(summary.avg_weekly_demand),
                num_weeks: summary.num_weeks,
                avg_rating: summary.avg_rating.map(round2),
            })
            .collect())
    }

    /// Weekly series with totals and a trend label
    pub fn product_demand(&self, product_id: &str) -> Result<ProductDemand> {
        let table = self.table()?;
        let series = table.series(product_id);
        if series.is_empty() {
            return Err(ServiceError::NotFound("Product not found".into()));
        }

        let demands: Vec<f64> = series.iter().map(|r| f64::from(r.demand)).collect();
        let total_demand: u64 = series.iter().map(|r| u64::from(r.demand)).sum();
        let max_demand = series.iter().map(|r| r.demand).max().unwrap_or(0);
        let min_demand = series.iter().map(|r| r.demand).min().unwrap_or(0);

        Ok(ProductDemand {
            asin: product_id.to_string(),
            title: self.title(product_id),
            total_demand,
            avg_demand: round2(total_demand as f64 / series.len() as f64),
            max_demand,
            min_demand,
            trend: classify_trend(&demands),
            time_series: series
                .iter()
                .map(|record| TimeSeriesPoint {
                    week: record.week,
                    demand: round2(f64::from(record.demand)),
                    rating: record.avg_rating.map(round2),
                })
                .collect(),
        })
    }

    pub fn overall_trend(&self) -> Result<Vec<WeeklyTotal>> {
        Ok(self.table()?.overall_trend())
    }

    pub fn categories(&self) -> Result<Vec<CategoryDemand>> {
        Ok(self.table()?.category_demand(&self.catalog))
    }

    /// Forecast `weeks` future weeks for one product
    #[instrument(skip(self))]
    pub fn forecast(&self, product_id: &str, weeks: usize) -> Result<ProductForecast> {
        check_range("weeks", weeks, FORECAST_WEEKS)?;
        let table = self.table()?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ServiceError::NotReady("Forecast model not loaded".into()))?;

        let series = table.series(product_id);
        if series.is_empty() {
            return Err(ServiceError::product_not_found(product_id));
        }

        let history: Vec<f64> = series.iter().map(|r| f64::from(r.demand)).collect();
        let forecast = model.forecaster.forecast(&history, weeks)?;

        let context_start = series.len().saturating_sub(FORECAST_CONTEXT_WEEKS);
        let historical: Vec<ForecastPoint> = series[context_start..]
            .iter()
            .map(|record| ForecastPoint::historical(record.week, f64::from(record.demand)))
            .collect();
        let combined = historical.iter().chain(&forecast).cloned().collect();

        info!(
            "Forecast for {}: {} weeks from {} historical",
            product_id,
            forecast.len(),
            series.len()
        );

        Ok(ProductForecast {
            asin: product_id.to_string(),
            title: self.title(product_id),
            model_type: model.info.model_type.clone(),
            model_mae: model.info.mae(),
            forecast_weeks: weeks,
            historical,
            forecast,
            combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Product, ReviewEvent};
    use forecast::{ModelError, Regressor, MIN_PREDICTION};

    const MONDAY: i64 = 1_672_617_600_000; // 2023-W01
    const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

    /// Always predicts the most recent value
    struct Persistence;

    impl Regressor for Persistence {
        fn n_features(&self) -> usize {
            5
        }

        fn predict(&self, features: &[f64]) -> std::result::Result<f64, ModelError> {
            Ok(features[0])
        }
    }

    fn events(product_id: &str, weekly_counts: &[usize]) -> Vec<ReviewEvent> {
        weekly_counts
            .iter()
            .enumerate()
            .flat_map(|(week, &count)| {
                (0..count).map(move |i| ReviewEvent {
                    product_id: product_id.to_string(),
                    rating: Some(if i % 2 == 0 { 5.0 } else { 4.0 }),
                    timestamp_ms: MONDAY + week as i64 * WEEK_MS + i as i64 * 1000,
                })
            })
            .collect()
    }

    fn service(with_model: bool) -> DemandService {
        let mut all = events("STEADY", &[3, 4, 2, 5, 4, 6, 5, 4, 6, 7, 6, 8]);
        all.extend(events("SHORT", &[1, 2, 1, 2, 1, 2, 1, 2, 1]));
        all.extend(events("GROWING", &[1, 1, 1, 1, 9, 9, 9, 9]));
        let table = DemandTable::from_events(&all);

        let catalog = MetadataCatalog::from_products(vec![
            Product {
                title: "A".repeat(80),
                categories: vec!["Kitchen".into()],
                ..Product::placeholder("STEADY")
            },
            Product {
                categories: vec!["Bath".into()],
                ..Product::placeholder("GROWING")
            },
        ]);

        let model = with_model.then(|| ForecastModel {
            forecaster: Arc::new(Forecaster::new(Arc::new(Persistence), &[]).unwrap()),
            info: Arc::new(ModelInfo::default()),
        });
        DemandService::new(Some(Arc::new(table)), Arc::new(catalog), model)
    }

    #[test]
    fn test_stats() {
        let stats = service(false).stats();
        assert_eq!(stats.status, "ready");
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.total_weeks, 12);
        assert_eq!(stats.time_range.start, Some(WeekKey::new(2023, 1)));
        assert_eq!(stats.assumption, DEMAND_ASSUMPTION);

        let empty = DemandService::new(None, Arc::new(MetadataCatalog::new()), None);
        assert_eq!(empty.stats().status, "not_loaded");
        assert!(matches!(empty.top_products(5), Err(ServiceError::NotReady(_))));
    }

    #[test]
    fn test_top_products_truncates_titles() {
        let top = service(false).top_products(2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].asin, "STEADY");
        assert_eq!(top[0].title.chars().count(), 63);
        assert!(top[0].title.ends_with("..."));
        assert_eq!(top[1].title, "Product GROWING");

        // No catalog entry: the ID stands in for the title
        let top = service(false).top_products(3).unwrap();
        assert_eq!(top[2].asin, "SHORT");
        assert_eq!(top[2].title, "SHORT");
        assert!(service(false).top_products(101).is_err());
    }

    #[test]
    fn test_product_demand_series() {
        let demand = service(false).product_demand("GROWING").unwrap();
        assert_eq!(demand.total_demand, 40);
        assert_eq!(demand.max_demand, 9);
        assert_eq!(demand.min_demand, 1);
        assert_eq!(demand.avg_demand, 5.0);
        assert_eq!(demand.trend, Trend::Increasing);
        assert_eq!(demand.time_series.len(), 8);
        assert_eq!(demand.time_series[4].rating, Some(4.56));

        assert!(matches!(
            service(false).product_demand("NOPE"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_categories() {
        let categories = service(false).categories().unwrap();
        assert_eq!(categories[0].category, "Kitchen");
        assert_eq!(categories[0].total_demand, 60);
        assert_eq!(categories[1].category, "Bath");
    }

    #[test]
    fn test_forecast_response() {
        let forecast = service(true).forecast("STEADY", 4).unwrap();
        assert_eq!(forecast.forecast_weeks, 4);
        assert_eq!(forecast.historical.len(), 12);
        assert_eq!(forecast.forecast.len(), 4);
        assert_eq!(forecast.combined.len(), 16);
        assert_eq!(forecast.historical[0].period, "2023-W01");
        assert!(!forecast.historical[0].is_forecast);
        assert_eq!(forecast.forecast[0].period, "Forecast-1");
        assert_eq!(forecast.model_type, "GradientBoostingRegressor");
        assert_eq!(forecast.model_mae, 0.0);
        assert!(forecast.forecast.iter().all(|p| p.demand >= MIN_PREDICTION));
    }

    #[test]
    fn test_forecast_errors() {
        let forecasting = service(true);
        assert!(matches!(
            forecasting.forecast("SHORT", 4),
            Err(ServiceError::InsufficientData { available: 9, required: 10 })
        ));
        assert!(matches!(forecasting.forecast("NOPE", 4), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            forecasting.forecast("STEADY", 17),
            Err(ServiceError::InvalidParameter(_))
        ));

        let no_model = service(false);
        assert!(!no_model.can_forecast());
        assert!(matches!(no_model.forecast("STEADY", 4), Err(ServiceError::NotReady(_))));
    }
}
