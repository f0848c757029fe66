//! SavedSearch-RS emulator server
//!
//! Serves the saved-search REST API from memory for local development.

use anyhow::Result;
use savedsearch_rs::{config, emulator};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting SavedSearch-RS emulator v{}", savedsearch_rs::VERSION);

    // Load configuration
    let settings = config::load()?;
    let emulator_settings = settings.emulator;
    info!(
        "Jobs complete after {} ms; login as {}",
        emulator_settings.job_latency_ms, emulator_settings.username
    );

    // Bind address
    let listener = TcpListener::bind((
        emulator_settings.bind_address.as_str(),
        emulator_settings.port,
    ))
    .await?;
    info!("Starting server on http://{}", listener.local_addr()?);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutting down");
    };

    emulator::serve(listener, emulator_settings, shutdown).await?;

    Ok(())
}
