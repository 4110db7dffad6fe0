//! Command-line and environment configuration shared by both binaries.

use crate::telemetry::LogFormat;
use clap::{Args, Parser};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Product metadata, one JSON record per line
pub const METADATA_FILE: &str = "meta_Home_and_Kitchen.jsonl";
/// Older dumps of the same metadata use a `.json` extension
pub const METADATA_FALLBACK_FILE: &str = "meta_Home_and_Kitchen.json";
/// Review events used as the demand signal
pub const EVENTS_FILE: &str = "Home_and_Kitchen.jsonl";

pub const DEFAULT_METADATA_SCAN_CAP: usize = 500_000;
pub const DEFAULT_METADATA_MIN_RESOLVED: usize = 100;
pub const DEFAULT_METADATA_FALLBACK_ROWS: usize = 10_000;
pub const DEFAULT_EVENT_ROW_CAP: usize = 100_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Where artifacts live and how much of the raw data to read at startup
#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    /// Directory holding the exported similarity and forecast artifacts
    #[arg(long, env = "SHOPSENSE_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Directory holding the raw metadata and review dumps
    #[arg(long, env = "SHOPSENSE_DATASET_DIR", default_value = "dataset")]
    pub dataset_dir: PathBuf,

    /// Stop scanning product metadata after this many lines
    #[arg(long, env = "SHOPSENSE_METADATA_SCAN_CAP", default_value_t = DEFAULT_METADATA_SCAN_CAP)]
    pub metadata_scan_cap: usize,

    /// Below this many resolved products, also keep the first rows of the dump
    #[arg(long, env = "SHOPSENSE_METADATA_MIN_RESOLVED", default_value_t = DEFAULT_METADATA_MIN_RESOLVED)]
    pub metadata_min_resolved: usize,

    /// How many leading rows the low-coverage fallback keeps
    #[arg(long, env = "SHOPSENSE_METADATA_FALLBACK_ROWS", default_value_t = DEFAULT_METADATA_FALLBACK_ROWS)]
    pub metadata_fallback_rows: usize,

    /// Maximum number of review events read for demand aggregation
    #[arg(long, env = "SHOPSENSE_EVENT_ROW_CAP", default_value_t = DEFAULT_EVENT_ROW_CAP)]
    pub event_row_cap: usize,

    /// Wall-clock budget for a single request's computation
    #[arg(long, env = "SHOPSENSE_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
}

impl ServiceConfig {
    pub fn new(models_dir: impl Into<PathBuf>, dataset_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            dataset_dir: dataset_dir.into(),
            metadata_scan_cap: DEFAULT_METADATA_SCAN_CAP,
            metadata_min_resolved: DEFAULT_METADATA_MIN_RESOLVED,
            metadata_fallback_rows: DEFAULT_METADATA_FALLBACK_ROWS,
            event_row_cap: DEFAULT_EVENT_ROW_CAP,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    /// The `.jsonl` metadata dump, or the `.json` one if only that exists
    pub fn metadata_path(&self) -> PathBuf {
        let primary = self.dataset_dir.join(METADATA_FILE);
        let fallback = self.dataset_dir.join(METADATA_FALLBACK_FILE);
        if !primary.exists() && fallback.exists() {
            fallback
        } else {
            primary
        }
    }

    pub fn events_path(&self) -> PathBuf {
        self.dataset_dir.join(EVENTS_FILE)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new("models", "dataset")
    }
}

/// ShopSense HTTP server
#[derive(Debug, Parser)]
#[command(name = "shopsense-server")]
#[command(about = "Product recommendations and demand forecasts over HTTP", long_about = None)]
pub struct ServerArgs {
    #[command(flatten)]
    pub service: ServiceConfig,

    /// Interface to bind
    #[arg(long, env = "SHOPSENSE_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    #[arg(long, env = "SHOPSENSE_PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "SHOPSENSE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
