//! End-to-end: load an exported model from disk and forecast with it.

use forecast::model::{MODEL_FILE, MODEL_INFO_FILE};
use forecast::{Forecaster, LoadedModel, MIN_PREDICTION};
use std::fs;

/// One stump on lag_1 (feature 0): low demand → 1.0, high demand → 8.0
const MODEL_JSON: &str = r#"{
    "init_prediction": 0.0,
    "learning_rate": 1.0,
    "n_features": 5,
    "trees": [{
        "children_left": [1, -1, -1],
        "children_right": [2, -1, -1],
        "feature": [0, -2, -2],
        "threshold": [4.5, -2.0, -2.0],
        "value": [0.0, 1.0, 8.0]
    }]
}"#;

const INFO_JSON: &str = r#"{
    "model_type": "GradientBoostingRegressor",
    "features": ["lag_1", "lag_2", "lag_4", "rolling_mean_4", "rolling_std_4"],
    "metrics": {"MAE": 1.23, "RMSE": 2.0}
}"#;

#[test]
fn test_forecast_with_exported_model() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(MODEL_FILE), MODEL_JSON).unwrap();
    fs::write(dir.path().join(MODEL_INFO_FILE), INFO_JSON).unwrap();

    let (model, report) = LoadedModel::load(dir.path());
    assert!(report.all_loaded());
    let model = model.unwrap();
    assert_eq!(model.info.mae(), 1.23);

    let forecaster = Forecaster::new(model.regressor.clone(), &model.info.features).unwrap();
    let history = [2.0, 3.0, 2.0, 4.0, 3.0, 5.0, 6.0, 5.0, 6.0, 7.0, 6.0, 8.0];
    let points = forecaster.forecast(&history, 16).unwrap();

    assert_eq!(points.len(), 16);
    assert_eq!(points[0].demand, 8.0);
    assert_eq!(points[15].period, "Forecast-16");
    assert!(points.iter().all(|p| p.is_forecast && p.demand >= MIN_PREDICTION));
}

#[test]
fn test_corrupt_model_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(MODEL_FILE), r#"{"trees": "nope"}"#).unwrap();
    fs::write(dir.path().join(MODEL_INFO_FILE), INFO_JSON).unwrap();

    let (model, report) = LoadedModel::load(dir.path());
    assert!(model.is_none());
    assert!(!report.is_loaded(MODEL_FILE));
    assert!(report.is_loaded(MODEL_INFO_FILE));
}
