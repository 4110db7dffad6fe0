//! Single-step regression model.
//!
//! The forecaster only needs "features in, one number out". The shipped
//! model is a gradient-boosted ensemble of regression trees exported to
//! JSON by the training pipeline and evaluated here in-process.

use crate::error::ModelError;
use data_loader::artifacts::{read_json, ArtifactReport};
use data_loader::DataLoadError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const MODEL_FILE: &str = "demand_forecast_gb.json";
pub const MODEL_INFO_FILE: &str = "demand_forecast_info.json";

/// Anything that maps a feature vector to a single prediction
pub trait Regressor: Send + Sync {
    fn n_features(&self) -> usize;

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;
}

// =============================================================================
// Regression Trees
// =============================================================================

/// One tree in parallel-array form; node 0 is the root.
///
/// A node is a leaf when `children_left[node] == -1`. Otherwise a sample
/// goes left when `x[feature[node]] <= threshold[node]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        let n = self.children_left.len();
        if n == 0 {
            return Err(ModelError::InvalidModel("empty tree".into()));
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err(ModelError::InvalidModel("tree arrays differ in length".into()));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == -1 {
                continue;
            }
            // Children always follow their parent, which also rules out cycles
            let in_range = |child: i64| child > node as i64 && (child as usize) < n;
            if !in_range(left) || !in_range(right) {
                return Err(ModelError::InvalidModel(format!(
                    "node {} has invalid children ({}, {})",
                    node, left, right
                )));
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(ModelError::InvalidModel(format!(
                    "node {} splits on feature {} of {}",
                    node, feature, n_features
                )));
            }
        }
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            if left == -1 {
                return self.value[node];
            }
            node = if x[self.feature[node] as usize] <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
    }
}

/// Additive tree ensemble: `init + learning_rate × Σ tree(x)`
#[derive(Debug, Clone, Deserialize)]
pub struct GradientBoostedTrees {
    pub init_prediction: f64,
    pub learning_rate: f64,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Decode and validate the JSON export
    pub fn from_json(bytes: &[u8]) -> Result<Self, DataLoadError> {
        let model: Self = serde_json::from_slice(bytes).map_err(|source| DataLoadError::Json {
            file: MODEL_FILE.to_string(),
            source,
        })?;
        model
            .validate()
            .map_err(|e| DataLoadError::invalid_artifact(MODEL_FILE, e.to_string()))?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.init_prediction.is_finite() || !self.learning_rate.is_finite() {
            return Err(ModelError::InvalidModel("non-finite ensemble parameters".into()));
        }
        for tree in &self.trees {
            tree.validate(self.n_features)?;
        }
        Ok(())
    }
}

impl Regressor for GradientBoostedTrees {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                got: features.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        let prediction = self.init_prediction + self.learning_rate * sum;
        if prediction.is_finite() {
            Ok(prediction)
        } else {
            Err(ModelError::NonFinite)
        }
    }
}

// =============================================================================
// Sidecar
// =============================================================================

/// `demand_forecast_info.json`: feature order and evaluation metrics
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

fn default_model_type() -> String {
    "GradientBoostingRegressor".to_string()
}

impl ModelInfo {
    /// Mean absolute error from evaluation, 0 when not recorded
    pub fn mae(&self) -> f64 {
        self.metrics.get("MAE").copied().unwrap_or(0.0)
    }
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            model_type: default_model_type(),
            features: Vec::new(),
            metrics: HashMap::new(),
        }
    }
}

/// The regression model together with its sidecar
#[derive(Clone)]
pub struct LoadedModel {
    pub regressor: Arc<dyn Regressor>,
    pub info: ModelInfo,
}

impl LoadedModel {
    /// Load model and sidecar from `models_dir`; both must be present
    pub fn load(models_dir: &Path) -> (Option<Self>, ArtifactReport) {
        let mut report = ArtifactReport::new();

        let model = report.record(
            MODEL_FILE,
            data_loader::artifacts::read_artifact(&models_dir.join(MODEL_FILE))
                .and_then(|bytes| GradientBoostedTrees::from_json(&bytes)),
        );
        let info = report.record(
            MODEL_INFO_FILE,
            read_json::<ModelInfo>(&models_dir.join(MODEL_INFO_FILE)),
        );

        let loaded = match (model, info) {
            (Some(model), Some(info)) => Some(Self {
                regressor: Arc::new(model),
                info,
            }),
            _ => None,
        };
        (loaded, report)
    }
}
