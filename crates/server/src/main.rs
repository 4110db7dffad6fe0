//! ShopSense HTTP server.
//!
//! Loads all artifacts before binding, then serves the `/api/v1` API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use server::{http, init_tracing, AppState, ServerArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing(args.log_format);

    info!("Starting ShopSense server");

    // Loading is CPU-bound and happens once, before any request is accepted
    let config = args.service.clone();
    let state = tokio::task::spawn_blocking(move || AppState::build(config))
        .await
        .context("Startup task panicked")?;

    for (artifact, status) in state.readiness.artifacts.iter() {
        if !status.is_loaded() {
            warn!(artifact, ?status, "Serving without artifact");
        }
    }

    let addr = SocketAddr::from((args.bind, args.port));
    http::serve(Arc::new(state), addr).await
}
