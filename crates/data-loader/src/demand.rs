//! Weekly demand aggregation.
//!
//! Review events are bucketed by (product, ISO week). The number of events
//! in a bucket is the demand for that week; there is no sales signal in
//! the data, so review volume stands in for it.

use crate::catalog::MetadataCatalog;
use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info};

/// Maximum number of categories returned by [`DemandTable::category_demand`]
pub const TOP_CATEGORIES: usize = 15;

/// Dataset-wide demand figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandStats {
    pub total_products: usize,
    pub total_weeks: usize,
    pub total_demand: u64,
    pub first_week: Option<WeekKey>,
    pub last_week: Option<WeekKey>,
}

/// Demand across all products in one week
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyTotal {
    pub week: WeekKey,
    pub total_demand: u64,
    pub active_products: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDemand {
    pub category: String,
    pub total_demand: u64,
    pub num_products: usize,
}

#[derive(Default)]
struct Bucket {
    events: u32,
    rating_sum: f64,
    rated: u32,
}

/// Immutable weekly demand table plus its per-product rollups.
///
/// Records are ordered by (product ID, week); summaries by total demand,
/// highest first, ties broken by product ID.
#[derive(Debug, Clone, Default)]
pub struct DemandTable {
    records: Vec<WeeklyDemandRecord>,
    ranges: HashMap<ProductId, Range<usize>>,
    summaries: Vec<ProductDemandSummary>,
}

impl DemandTable {
    /// Aggregate events; events whose timestamp can't be bucketed are ignored
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ReviewEvent>) -> Self {
        let mut buckets: BTreeMap<(ProductId, WeekKey), Bucket> = BTreeMap::new();
        let mut unbucketed = 0usize;

        for event in events {
            let Some(week) = WeekKey::from_timestamp_millis(event.timestamp_ms) else {
                unbucketed += 1;
                continue;
            };
            let bucket = buckets.entry((event.product_id.clone(), week)).or_default();
            bucket.events += 1;
            if let Some(rating) = event.rating {
                bucket.rating_sum += rating;
                bucket.rated += 1;
            }
        }
        if unbucketed > 0 {
            debug!(unbucketed, "Ignored events with out-of-range timestamps");
        }

        let records: Vec<WeeklyDemandRecord> = buckets
            .into_iter()
            .map(|((product_id, week), bucket)| WeeklyDemandRecord {
                product_id,
                week,
                demand: bucket.events,
                avg_rating: (bucket.rated > 0).then(|| bucket.rating_sum / bucket.rated as f64),
            })
            .collect();

        let mut ranges: HashMap<ProductId, Range<usize>> = HashMap::new();
        let mut start = 0;
        for i in 1..=records.len() {
            if i == records.len() || records[i].product_id != records[start].product_id {
                ranges.insert(records[start].product_id.clone(), start..i);
                start = i;
            }
        }

        let mut table = Self {
            records,
            ranges,
            summaries: Vec::new(),
        };
        table.summaries = table.compute_summaries();
        table
    }

    /// Read up to `row_cap` events from an NDJSON file and aggregate them
    pub fn load_path(path: &Path, row_cap: usize) -> Result<Self> {
        if !path.exists() {
            return Err(DataLoadError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let batch = parser::read_events(BufReader::new(File::open(path)?), row_cap)?;
        let table = Self::from_events(&batch.events);
        info!(
            events = batch.events.len(),
            skipped = batch.skipped,
            products = table.product_count(),
            records = table.records.len(),
            "Built weekly demand table"
        );
        Ok(table)
    }

    fn compute_summaries(&self) -> Vec<ProductDemandSummary> {
        let mut summaries: Vec<ProductDemandSummary> = self
            .ranges
            .iter()
            .map(|(product_id, range)| summarize(product_id, &self.records[range.clone()]))
            .collect();
        summaries.sort_by(|a, b| {
            b.total_demand
                .cmp(&a.total_demand)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        summaries
    }

    pub fn records(&self) -> &[WeeklyDemandRecord] {
        &self.records
    }

    /// Weekly series of one product, oldest first; empty if unknown
    pub fn series(&self, product_id: &str) -> &[WeeklyDemandRecord] {
        self.ranges
            .get(product_id)
            .map(|range| &self.records[range.clone()])
            .unwrap_or(&[])
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.ranges.contains_key(product_id)
    }

    pub fn product_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summaries(&self) -> &[ProductDemandSummary] {
        &self.summaries
    }

    pub fn top_products(&self, limit: usize) -> &[ProductDemandSummary] {
        &self.summaries[..limit.min(self.summaries.len())]
    }

    pub fn stats(&self) -> DemandStats {
        let weekly = self.overall_trend();
        DemandStats {
            total_products: self.product_count(),
            total_weeks: weekly.len(),
            total_demand: self.records.iter().map(|r| r.demand as u64).sum(),
            first_week: weekly.first().map(|w| w.week),
            last_week: weekly.last().map(|w| w.week),
        }
    }

    /// Demand summed over all products per week, oldest first
    pub fn overall_trend(&self) -> Vec<WeeklyTotal> {
        let mut weeks: BTreeMap<WeekKey, WeeklyTotal> = BTreeMap::new();
        for record in &self.records {
            let total = weeks.entry(record.week).or_insert(WeeklyTotal {
                week: record.week,
                total_demand: 0,
                active_products: 0,
            });
            total.total_demand += record.demand as u64;
            // (product, week) pairs are unique, so each record is a distinct product
            total.active_products += 1;
        }
        weeks.into_values().collect()
    }

    /// Demand grouped by each product's first catalog category.
    ///
    /// Products without a catalog entry or without categories are left out.
    pub fn category_demand(&self, catalog: &MetadataCatalog) -> Vec<CategoryDemand> {
        let mut order: Vec<CategoryDemand> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for summary in &self.summaries {
            let Some(category) = catalog
                .get(&summary.product_id)
                .and_then(|p| p.categories.first())
            else {
                continue;
            };
            let pos = *positions.entry(category.as_str()).or_insert_with(|| {
                order.push(CategoryDemand {
                    category: category.clone(),
                    total_demand: 0,
                    num_products: 0,
                });
                order.len() - 1
            });
            order[pos].total_demand += summary.total_demand;
            order[pos].num_products += 1;
        }

        order.sort_by(|a, b| b.total_demand.cmp(&a.total_demand));
        order.truncate(TOP_CATEGORIES);
        order
    }
}

fn summarize(product_id: &str, series: &[WeeklyDemandRecord]) -> ProductDemandSummary {
    let demands: Vec<f64> = series.iter().map(|r| r.demand as f64).collect();
    let total: u64 = series.iter().map(|r| r.demand as u64).sum();
    let ratings: Vec<f64> = series.iter().filter_map(|r| r.avg_rating).collect();

    ProductDemandSummary {
        product_id: product_id.to_string(),
        num_weeks: series.len(),
        total_demand: total,
        avg_weekly_demand: mean(&demands).unwrap_or(0.0),
        demand_std: sample_std(&demands),
        avg_rating: mean(&ratings),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with Bessel's correction; `None` below two values
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Compare the mean of the second half of a series with the first half.
///
/// With an odd length the extra point goes to the second half.
pub fn classify_trend(demands: &[f64]) -> Trend {
    let mid = demands.len() / 2;
    if mid == 0 {
        return Trend::InsufficientData;
    }
    let (first, second) = demands.split_at(mid);
    let (Some(first), Some(second)) = (mean(first), mean(second)) else {
        return Trend::InsufficientData;
    };

    if second > first * 1.1 {
        Trend::Increasing
    } else if second < first * 0.9 {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}
