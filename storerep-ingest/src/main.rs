//! storerep-ingest - store performance report ingest service
//!
//! Holds one working record per process and fills it from manual edits,
//! spreadsheet uploads and AI image extraction.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storerep_ingest::config::{Args, ServiceConfig};
use storerep_ingest::extractors::image::{HttpCollaborator, ImageExtractionClient};
use storerep_ingest::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is resolved before tracing starts so the configured level applies
    let config = ServiceConfig::load(&args).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting storerep-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let collaborator = HttpCollaborator::new(config.extraction_endpoint.clone(), config.request_timeout)
        .context("Failed to create extraction client")?;
    info!(
        endpoint = collaborator.endpoint(),
        timeout_secs = config.request_timeout.as_secs(),
        "Image extraction collaborator"
    );

    let image_client = ImageExtractionClient::new(Arc::new(collaborator), config.schedule);
    info!(
        max_attempts = image_client.schedule().max_attempts,
        base_delay_ms = image_client.schedule().base_delay.as_millis() as u64,
        "Image extraction retry schedule"
    );

    let state = AppState::new(image_client);
    let app = storerep_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
