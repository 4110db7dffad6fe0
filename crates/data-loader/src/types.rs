//! Core domain types shared by every crate in the workspace.
//!
//! This module defines the normalized product record, the demand records
//! produced by the aggregation pass and the calendar week key they are
//! grouped by. Raw, heterogeneous input records live in [`crate::parser`].

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// External unique key of a product (an ASIN in the reference dataset)
pub type ProductId = String;

/// Maximum number of categories kept on a normalized product
pub const MAX_CATEGORIES: usize = 3;

/// Maximum description length in characters, ellipsis included
pub const MAX_DESCRIPTION_CHARS: usize = 200;

// =============================================================================
// Product
// =============================================================================

/// A product as displayed to clients.
///
/// Built once from the metadata catalog and never mutated afterwards.
/// Optional fields are `None` when the source record lacked them or carried
/// a value of the wrong shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "asin")]
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    /// Average customer rating on a 0-5 scale
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub store: Option<String>,
    /// Ordered category path, at most [`MAX_CATEGORIES`] entries
    pub categories: Vec<String>,
}

impl Product {
    /// Attributes served for a product that has no catalog entry
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: format!("Product {}", id),
            description: String::new(),
            image_url: None,
            price: None,
            rating: None,
            rating_count: None,
            store: None,
            categories: Vec::new(),
        }
    }

    /// True when the product carries a non-empty image reference
    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

// =============================================================================
// Demand Types
// =============================================================================

/// ISO-8601 week identifier (`2023-W07`).
///
/// Ordering is chronological: by ISO year, then week number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// Bucket a millisecond UTC timestamp into its ISO week
    pub fn from_timestamp_millis(timestamp_ms: i64) -> Option<Self> {
        let date = DateTime::from_timestamp_millis(timestamp_ms)?;
        let iso = date.iso_week();
        Some(Self::new(iso.year(), iso.week()))
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl Serialize for WeekKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single review/purchase event, the raw input of demand aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewEvent {
    pub product_id: ProductId,
    /// Star rating attached to the event, if any
    pub rating: Option<f64>,
    /// Milliseconds since the Unix epoch (UTC)
    pub timestamp_ms: i64,
}

/// Demand of one product in one week.
///
/// `demand` is the number of events in the bucket; event count is used as
/// a proxy for units sold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyDemandRecord {
    pub product_id: ProductId,
    pub week: WeekKey,
    pub demand: u32,
    pub avg_rating: Option<f64>,
}

/// Per-product rollup over all of its weekly records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDemandSummary {
    pub product_id: ProductId,
    pub num_weeks: usize,
    pub total_demand: u64,
    pub avg_weekly_demand: f64,
    /// Sample standard deviation of weekly demand; `None` for a single week
    pub demand_std: Option<f64>,
    pub avg_rating: Option<f64>,
}

/// Direction of a demand series, comparing its two halves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient_data",
        };
        f.write_str(label)
    }
}
