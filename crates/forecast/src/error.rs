//! Error types for the forecast crate.

use thiserror::Error;

/// Failures of a single-step regression model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The exported model is structurally unusable
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Feature vector length didn't match what the model was trained on
    #[error("Expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },

    /// The model produced NaN or infinity
    #[error("Model produced a non-finite prediction")]
    NonFinite,
}

/// Reasons a forecast can't be produced
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Too few weeks of history for the product
    #[error("Need at least {required} weeks of history, have {available}")]
    InsufficientData { available: usize, required: usize },

    /// The model sidecar names a feature this forecaster can't compute
    #[error("Unknown model feature '{0}'")]
    UnknownFeature(String),

    /// Feature layout and model disagree on the feature count
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, ForecastError>;
