//! Quanta dashboard server binary

use anyhow::{Context, Result};
use quanta_viewer::api::{create_router, ApiState};
use quanta_viewer::{Dataset, ViewerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config from file
    let config_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "config.toml".to_string()),
    );

    let config = ViewerConfig::load(&config_path)
        .with_context(|| format!("Failed to load config file: {}", config_path.display()))?;

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Quanta Viewer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = %config_path.display(),
        max_len = config.max_len,
        "Loaded configuration"
    );

    let dataset = Dataset::load(&config.cluster_file, &config.context_file)
        .context("Failed to load cluster data")?;

    info!(
        samples = dataset.sample_count(),
        cluster_counts = ?dataset.cluster_counts(),
        "Dataset ready"
    );

    let state = Arc::new(ApiState::new(dataset, &config));
    info!(
        default_n_clusters = state.default_n_clusters,
        "Default cluster count"
    );

    // Create router
    let app = create_router(state);

    // Start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Dashboard at http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
