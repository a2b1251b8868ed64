mod api;
mod batch_planner;
mod bootstrap;
mod config;
mod object_keys;
mod object_store;
mod tokens;

use anyhow::{Context, Result};
use api::{start_api_server, AppState};
use config::Config;
use object_store::StoreClient;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting media gateway"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // One client per endpoint profile: internal for writes and bootstrap,
    // signer for every URL handed to clients
    let internal = Arc::new(
        StoreClient::new(&config.store, config.store.internal.clone())
            .await
            .context("Failed to initialize internal store client")?,
    );

    let signer = Arc::new(
        StoreClient::new(&config.store, config.store.signer_profile())
            .await
            .context("Failed to initialize signing store client")?,
    );

    bootstrap::ensure_buckets(&internal, &config.store).await;

    let api_state = AppState {
        internal,
        signer: signer.clone(),
        upload_bucket: config.store.upload_bucket.clone(),
        presign_bucket: config.store.presign_bucket().to_string(),
    };

    // Spawn API server task
    let api_config = config.api.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(api_state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!(
        public_endpoint = %signer.profile().url(),
        upload_bucket = %config.store.upload_bucket,
        "Media gateway started successfully"
    );

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down media gateway");

    api_handle.abort();

    info!("Media gateway stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
