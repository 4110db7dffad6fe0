//! Iterative multi-step forecasting.
//!
//! The regression model predicts one week ahead from five features of the
//! recent history. To forecast `h` weeks, each prediction is appended to
//! the history and the features are recomputed for the next step.
//!
//! Tree ensembles tend to saturate when fed their own output, producing a
//! flat line. When two consecutive steps come out nearly equal, the step
//! is replaced by a rolling mean plus an alternating variation and a share
//! of the recent trend. This only affects presentation.

use crate::error::{ForecastError, ModelError, Result};
use crate::history::{HistoryBuffer, HISTORY_CAPACITY};
use crate::model::Regressor;
use data_loader::WeekKey;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Weeks of history required before a forecast is attempted
pub const MIN_HISTORY_WEEKS: usize = 10;

/// Floor applied to every forecast value
pub const MIN_PREDICTION: f64 = 0.1;

/// Consecutive steps closer than this get the variation treatment
const SIMILARITY_THRESHOLD: f64 = 0.15;
/// Steps still closer than this after correction are pushed apart
const MIN_STEP_DELTA: f64 = 0.05;
const FORCED_STEP: f64 = 0.15;

/// One point of a demand chart, historical or forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    #[serde(rename = "week")]
    pub period: String,
    pub demand: f64,
    pub is_forecast: bool,
}

impl ForecastPoint {
    pub fn historical(week: WeekKey, demand: f64) -> Self {
        Self {
            period: week.to_string(),
            demand: round2(demand),
            is_forecast: false,
        }
    }

    fn forecast(step: usize, demand: f64) -> Self {
        Self {
            period: format!("Forecast-{}", step + 1),
            demand: round2(demand),
            is_forecast: true,
        }
    }
}

/// Features the model can be trained on, by sidecar name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Lag1,
    Lag2,
    Lag4,
    RollingMean4,
    RollingStd4,
}

impl Feature {
    pub const DEFAULT_ORDER: [Feature; 5] = [
        Feature::Lag1,
        Feature::Lag2,
        Feature::Lag4,
        Feature::RollingMean4,
        Feature::RollingStd4,
    ];

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "lag_1" => Ok(Feature::Lag1),
            "lag_2" => Ok(Feature::Lag2),
            "lag_4" => Ok(Feature::Lag4),
            "rolling_mean_4" => Ok(Feature::RollingMean4),
            "rolling_std_4" => Ok(Feature::RollingStd4),
            other => Err(ForecastError::UnknownFeature(other.to_string())),
        }
    }
}

/// Feature values for one step, computed from the last four history points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepFeatures {
    pub lag1: f64,
    pub lag2: f64,
    pub lag4: f64,
    pub rolling_mean4: f64,
    pub rolling_std4: f64,
}

impl StepFeatures {
    /// `None` with fewer than four points of history
    pub fn from_history(history: &HistoryBuffer) -> Option<Self> {
        let last4 = history.tail(4);
        if last4.len() < 4 {
            return None;
        }
        let rolling_mean4 = mean(&last4);
        let mut rolling_std4 = population_std(&last4);
        if rolling_std4 < 0.05 {
            rolling_std4 = (rolling_mean4 * 0.15).max(0.1);
        }
        Some(Self {
            lag1: history.lag(1)?,
            lag2: history.lag(2)?,
            lag4: history.lag(4)?,
            rolling_mean4,
            rolling_std4,
        })
    }

    fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Lag1 => self.lag1,
            Feature::Lag2 => self.lag2,
            Feature::Lag4 => self.lag4,
            Feature::RollingMean4 => self.rolling_mean4,
            Feature::RollingStd4 => self.rolling_std4,
        }
    }

    pub fn to_vector(&self, layout: &[Feature]) -> Vec<f64> {
        layout.iter().map(|&f| self.value(f)).collect()
    }
}

/// Spread and drift of the seed series, fixed before the loop starts
#[derive(Debug, Clone, Copy, PartialEq)]
struct SeedStats {
    std: f64,
    trend: f64,
}

impl SeedStats {
    /// Population std of the last 8 points, and mean(last 4) − mean(previous 4)
    fn from_series(series: &[f64]) -> Self {
        if series.len() < 8 {
            return Self { std: 0.2, trend: 0.0 };
        }
        let last8 = &series[series.len() - 8..];
        Self {
            std: population_std(last8),
            trend: mean(&last8[4..]) - mean(&last8[..4]),
        }
    }
}

/// Turns a one-step regressor into a multi-week forecaster
#[derive(Clone)]
pub struct Forecaster {
    model: Arc<dyn Regressor>,
    layout: Vec<Feature>,
}

impl Forecaster {
    /// Build with the feature order from the model sidecar; an empty list
    /// means the default order.
    pub fn new(model: Arc<dyn Regressor>, feature_names: &[String]) -> Result<Self> {
        let layout = if feature_names.is_empty() {
            Feature::DEFAULT_ORDER.to_vec()
        } else {
            feature_names
                .iter()
                .map(|name| Feature::parse(name))
                .collect::<Result<Vec<_>>>()?
        };
        if layout.len() != model.n_features() {
            return Err(ModelError::FeatureCount {
                expected: model.n_features(),
                got: layout.len(),
            }
            .into());
        }
        Ok(Self { model, layout })
    }

    /// Forecast `horizon` weeks after `history` (oldest first)
    #[instrument(skip(self, history), fields(history_len = history.len()))]
    pub fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<ForecastPoint>> {
        if history.len() < MIN_HISTORY_WEEKS {
            return Err(ForecastError::InsufficientData {
                available: history.len(),
                required: MIN_HISTORY_WEEKS,
            });
        }
        let points = self.run(history, horizon);
        debug!("Produced {} forecast points", points.len());
        Ok(points)
    }

    /// The forecasting loop, without the minimum-history check
    fn run(&self, history: &[f64], horizon: usize) -> Vec<ForecastPoint> {
        self.run_with_buffer(history, horizon).0
    }

    /// As [`Self::run`], also handing back the rolling buffer as it stands
    /// after the last step
    fn run_with_buffer(&self, history: &[f64], horizon: usize) -> (Vec<ForecastPoint>, HistoryBuffer) {
        let seed = SeedStats::from_series(history);
        let mut buffer = HistoryBuffer::seeded(history, HISTORY_CAPACITY);
        let mut points: Vec<ForecastPoint> = Vec::with_capacity(horizon);

        for step in 0..horizon {
            let previous = points.last().map(|p| p.demand);
            let prediction = match StepFeatures::from_history(&buffer) {
                None => short_history_estimate(&buffer, step),
                Some(features) => self.model_step(&features, previous, step, seed),
            };

            points.push(ForecastPoint::forecast(step, prediction));
            buffer.push(prediction);
        }
        (points, buffer)
    }

    fn model_step(
        &self,
        features: &StepFeatures,
        previous: Option<f64>,
        step: usize,
        seed: SeedStats,
    ) -> f64 {
        match self.model.predict(&features.to_vector(&self.layout)) {
            Ok(raw) => {
                let prediction = raw.max(MIN_PREDICTION);
                match previous {
                    Some(prev) => spread_from_previous(prediction, prev, step, features, seed),
                    None => prediction,
                }
            }
            Err(e) => {
                warn!(step, error = %e, "Model prediction failed; using rolling estimate");
                let variation = seed.std * 0.3 * direction(step);
                let drift = seed.trend * (step + 1) as f64 * 0.1;
                (features.rolling_mean4 + variation + drift).max(MIN_PREDICTION)
            }
        }
    }
}

/// Mean of what little history there is, with a small repeating wobble
fn short_history_estimate(buffer: &HistoryBuffer, step: usize) -> f64 {
    let average = buffer.mean().unwrap_or(1.0);
    let wobble = ((step % 3) as f64 - 1.0) * 0.1;
    (average + wobble).max(MIN_PREDICTION)
}

/// Keep consecutive forecast steps visibly apart
fn spread_from_previous(
    prediction: f64,
    previous: f64,
    step: usize,
    features: &StepFeatures,
    seed: SeedStats,
) -> f64 {
    let mut prediction = prediction;
    if (prediction - previous).abs() < SIMILARITY_THRESHOLD {
        let variation = (seed.std * 0.5).max(0.2) * direction(step) * (1.0 + step as f64 * 0.15);
        let drift = seed.trend * (step + 1) as f64 * 0.15;
        prediction = (features.rolling_mean4 + variation + drift).max(MIN_PREDICTION);
    }
    if (prediction - previous).abs() < MIN_STEP_DELTA {
        prediction = (previous + FORCED_STEP * direction(step)).max(MIN_PREDICTION);
    }
    prediction
}

/// +1 on even steps, −1 on odd
fn direction(step: usize) -> f64 {
    if step % 2 == 0 { 1.0 } else { -1.0 }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Predicts a fixed value regardless of input
    struct ConstantModel(f64);

    impl Regressor for ConstantModel {
        fn n_features(&self) -> usize {
            5
        }
        fn predict(&self, _features: &[f64]) -> std::result::Result<f64, ModelError> {
            Ok(self.0)
        }
    }

    /// Predicts lag_1 + 1
    struct StepUpModel;

    impl Regressor for StepUpModel {
        fn n_features(&self) -> usize {
            5
        }
        fn predict(&self, features: &[f64]) -> std::result::Result<f64, ModelError> {
            Ok(features[0] + 1.0)
        }
    }

    /// Predicts lag_1 + 1.0037 and keeps every feature vector it was given
    #[derive(Default)]
    struct RecordingModel(Mutex<Vec<Vec<f64>>>);

    impl Regressor for RecordingModel {
        fn n_features(&self) -> usize {
            5
        }
        fn predict(&self, features: &[f64]) -> std::result::Result<f64, ModelError> {
            self.0.lock().unwrap().push(features.to_vec());
            Ok(features[0] + 1.0037)
        }
    }

    struct BrokenModel;

    impl Regressor for BrokenModel {
        fn n_features(&self) -> usize {
            5
        }
        fn predict(&self, _features: &[f64]) -> std::result::Result<f64, ModelError> {
            Err(ModelError::NonFinite)
        }
    }

    fn forecaster(model: impl Regressor + 'static) -> Forecaster {
        Forecaster::new(Arc::new(model), &[]).unwrap()
    }

    #[test]
    fn test_minimum_history() {
        let f = forecaster(ConstantModel(5.0));
        let nine = [3.0; 9];
        assert_eq!(
            f.forecast(&nine, 4),
            Err(ForecastError::InsufficientData { available: 9, required: 10 })
        );

        let ten = [3.0; 10];
        let points = f.forecast(&ten, 4).unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].period, "Forecast-1");
        assert!(points.iter().all(|p| p.is_forecast));
    }

    #[test]
    fn test_first_step_is_raw_prediction() {
        let f = forecaster(StepUpModel);
        let history: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let points = f.forecast(&history, 3).unwrap();
        // 10 + 1, 11 + 1, 12 + 1: consecutive steps already differ enough
        let values: Vec<f64> = points.iter().map(|p| p.demand).collect();
        assert_eq!(values, vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_flat_model_output_is_spread() {
        let f = forecaster(ConstantModel(2.0));
        let points = f.forecast(&[2.0; 12], 8).unwrap();

        assert_eq!(points[0].demand, 2.0);
        for pair in points.windows(2) {
            assert!((pair[1].demand - pair[0].demand).abs() >= MIN_STEP_DELTA - 1e-9);
        }
    }

    #[test]
    fn test_flat_history_correction_values() {
        // std = 0, trend = 0, rolling mean 2: step 1 becomes 2 - 0.2 * 1.15
        let f = forecaster(ConstantModel(2.0));
        let points = f.forecast(&[2.0; 10], 2).unwrap();
        assert_eq!(points[1].demand, round2(2.0 - 0.2 * 1.15));
    }

    #[test]
    fn test_values_floored() {
        let f = forecaster(ConstantModel(-5.0));
        let points = f.forecast(&[0.0; 10], 16).unwrap();
        assert!(points.iter().all(|p| p.demand >= MIN_PREDICTION));
    }

    #[test]
    fn test_model_failure_falls_back() {
        let f = forecaster(BrokenModel);
        let history = [4.0, 4.0, 4.0, 4.0, 6.0, 6.0, 6.0, 6.0, 6.0, 6.0];
        let points = f.forecast(&history, 2).unwrap();
        // last 8: [4,4,6,6,6,6,6,6]; std = sqrt(0.75); trend = 6 - 5
        let std = 0.75f64.sqrt();
        assert_eq!(points[0].demand, round2(6.0 + std * 0.3 + 0.1));
    }

    #[test]
    fn test_short_history_fallback() {
        let f = forecaster(ConstantModel(9.0));
        // Bypass the minimum-history check to reach the short-history branch
        let points = f.run(&[2.0, 4.0], 3);
        assert_eq!(points[0].demand, round2(3.0 - 0.1));
        assert!(points.iter().all(|p| p.demand >= MIN_PREDICTION));
    }

    #[test]
    fn test_layout_from_sidecar() {
        let names = vec!["lag_1".to_string(), "rolling_std_4".to_string()];
        let err = Forecaster::new(Arc::new(ConstantModel(1.0)), &names).err();
        assert!(matches!(err, Some(ForecastError::Model(ModelError::FeatureCount { .. }))));

        let names = vec!["lag_3".to_string()];
        let err = Forecaster::new(Arc::new(ConstantModel(1.0)), &names).err();
        assert_eq!(err, Some(ForecastError::UnknownFeature("lag_3".into())));
    }

    #[test]
    fn test_step_features() {
        let buffer = HistoryBuffer::seeded(&[1.0, 2.0, 3.0, 4.0, 5.0], 20);
        let features = StepFeatures::from_history(&buffer).unwrap();
        assert_eq!(features.lag1, 5.0);
        assert_eq!(features.lag2, 4.0);
        assert_eq!(features.lag4, 2.0);
        assert_eq!(features.rolling_mean4, 3.5);
        assert!((features.rolling_std4 - 1.25f64.sqrt()).abs() < 1e-12);

        let flat = HistoryBuffer::seeded(&[2.0; 4], 20);
        let features = StepFeatures::from_history(&flat).unwrap();
        assert!((features.rolling_std4 - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_history_stays_bounded_over_long_horizon() {
        let model = Arc::new(RecordingModel::default());
        let f = Forecaster::new(model.clone(), &[]).unwrap();
        let history: Vec<f64> = (0..32).map(|v| 1.0 + v as f64 * 0.37).collect();

        let (points, buffer) = f.run_with_buffer(&history, 16);
        assert_eq!(points.len(), 16);
        assert_eq!(buffer.len(), HISTORY_CAPACITY);

        // Every step reads features off the most recent 20 values, with
        // forecasts fed back at full precision
        let mut expected: Vec<f64> = history[history.len() - HISTORY_CAPACITY..].to_vec();
        let seen = model.0.lock().unwrap();
        assert_eq!(seen.len(), 16);
        for features in seen.iter() {
            let n = expected.len();
            assert_eq!(features[0], expected[n - 1]);
            assert_eq!(features[1], expected[n - 2]);
            assert_eq!(features[2], expected[n - 4]);
            let mean4 = expected[n - 4..].iter().sum::<f64>() / 4.0;
            assert!((features[3] - mean4).abs() < 1e-12);
            expected.push(features[0] + 1.0037);
            expected.remove(0);
        }
        assert_eq!(buffer.tail(HISTORY_CAPACITY), expected);
        assert_ne!(buffer.lag(1), Some(points[15].demand));
    }
}
