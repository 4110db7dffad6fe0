//! # Server Crate
//!
//! Service objects, startup and HTTP routing for the ShopSense product
//! recommender and demand forecaster.
//!
//! ## Main Components
//!
//! - **bootstrap**: Loads every artifact once and reports readiness
//! - **recommendations**: Collaborative, content and hybrid recommendations
//! - **fusion**: Weighted blending of two recommendation lists
//! - **demand**: Demand analytics and per-product forecasts
//! - **http**: The axum router under `/api/v1`
//! - **config** / **telemetry**: Command-line configuration and logging setup

pub mod bootstrap;
pub mod config;
pub mod demand;
pub mod error;
pub mod fusion;
pub mod http;
pub mod params;
pub mod recommendations;
pub mod telemetry;

pub use bootstrap::{AppState, Capabilities, ReadinessReport};
pub use config::{ServerArgs, ServiceConfig};
pub use demand::{DemandService, ForecastModel, ProductForecast};
pub use error::{Result, ServiceError};
pub use recommendations::{RecommendationResponse, RecommendationService};
pub use telemetry::{init_tracing, LogFormat};
