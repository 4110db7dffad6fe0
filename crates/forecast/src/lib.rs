//! # Forecast Crate
//!
//! Multi-week demand forecasting on top of a single-step regression model.
//!
//! ## Main Components
//!
//! - **model**: The [`Regressor`] seam and the gradient-boosted tree ensemble
//!   loaded from the training pipeline's JSON export
//! - **history**: Fixed-capacity rolling history buffer
//! - **forecaster**: The autoregressive loop with its anti-flatline correction
//! - **error**: Model and forecast error types
//!
//! ## Example Usage
//!
//! ```ignore
//! use forecast::{Forecaster, LoadedModel};
//!
//! let (model, _report) = LoadedModel::load(Path::new("models"));
//! let model = model.expect("model artifacts present");
//! let forecaster = Forecaster::new(model.regressor.clone(), &model.info.features)?;
//!
//! let weekly: Vec<f64> = vec![3.0, 4.0, 2.0, 5.0, 4.0, 6.0, 5.0, 4.0, 6.0, 7.0];
//! for point in forecaster.forecast(&weekly, 8)? {
//!     println!("{}: {:.2}", point.period, point.demand);
//! }
//! ```

pub mod error;
pub mod forecaster;
pub mod history;
pub mod model;

pub use error::{ForecastError, ModelError, Result};
pub use forecaster::{round2, ForecastPoint, Forecaster, MIN_HISTORY_WEEKS, MIN_PREDICTION};
pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use model::{GradientBoostedTrees, LoadedModel, ModelInfo, Regressor};
