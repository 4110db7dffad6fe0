//! Query parameters, their defaults and range checks.

use crate::error::{Result, ServiceError};
use serde::Deserialize;
use std::fmt::Display;
use std::ops::RangeInclusive;

pub const RECOMMENDATION_COUNT: RangeInclusive<usize> = 1..=20;
pub const PRODUCT_PAGE: RangeInclusive<usize> = 1..=100;
pub const SEARCH_LIMIT: RangeInclusive<usize> = 1..=50;
pub const TOP_PRODUCTS_LIMIT: RangeInclusive<usize> = 1..=100;
pub const FORECAST_WEEKS: RangeInclusive<usize> = 1..=16;
pub const MIN_QUERY_CHARS: usize = 2;

pub const DEFAULT_RECOMMENDATIONS: usize = 6;
pub const DEFAULT_CF_WEIGHT: f64 = 0.6;
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_FORECAST_WEEKS: usize = 8;

/// Reject `value` unless it lies in `range`
pub fn check_range<T>(name: &str, value: T, range: RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidParameter(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )))
    }
}

pub fn check_cf_weight(cf_weight: f64) -> Result<()> {
    if cf_weight.is_nan() {
        return Err(ServiceError::InvalidParameter("cf_weight must be a number".into()));
    }
    check_range("cf_weight", cf_weight, 0.0..=1.0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendParams {
    #[serde(default = "default_recommendations")]
    pub n: usize,
    #[serde(default = "default_cf_weight")]
    pub cf_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page_size")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastParams {
    #[serde(default = "default_forecast_weeks")]
    pub weeks: usize,
}

fn default_recommendations() -> usize {
    DEFAULT_RECOMMENDATIONS
}

fn default_cf_weight() -> f64 {
    DEFAULT_CF_WEIGHT
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_forecast_weeks() -> usize {
    DEFAULT_FORECAST_WEEKS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range("n", 1, RECOMMENDATION_COUNT).is_ok());
        assert!(check_range("n", 20, RECOMMENDATION_COUNT).is_ok());
        let err = check_range("n", 21, RECOMMENDATION_COUNT).unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter: n must be between 1 and 20, got 21");
        assert!(check_range("n", 0, RECOMMENDATION_COUNT).is_err());
    }

    #[test]
    fn test_cf_weight_bounds() {
        assert!(check_cf_weight(0.0).is_ok());
        assert!(check_cf_weight(1.0).is_ok());
        assert!(check_cf_weight(1.01).is_err());
        assert!(check_cf_weight(-0.1).is_err());
        assert!(check_cf_weight(f64::NAN).is_err());
    }

    #[test]
    fn test_param_defaults() {
        let params: RecommendParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.n, 6);
        assert_eq!(params.cf_weight, 0.6);
        let page: PageParams = serde_json::from_str(r#"{"limit": 5}"#).unwrap();
        assert_eq!((page.limit, page.offset), (5, 0));
        let forecast: ForecastParams = serde_json::from_str("{}").unwrap();
        assert_eq!(forecast.weeks, 8);
    }
}
