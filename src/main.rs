//! price-compass - Main entry point.
//!
//! Sets up the Axum HTTP server with tracing, graceful shutdown,
//! and all API routes.

use anyhow::Context;
use axum::middleware;
use price_compass::services::currency::ExchangeRateService;
use price_compass::{AppState, Config, extractors, fetcher, observability, routes};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize observability (tracing and metrics)
    observability::init_tracing();
    observability::init_metrics();
    let metrics_handle = routes::setup_metrics_recorder();

    tracing::info!("Starting price-compass");

    // Load application configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        exchange_rate_key = config.exchange_rate.api_key.is_some(),
        "Server configuration loaded"
    );

    // Shared HTTP fetcher for every extractor
    let fetcher = fetcher::Fetcher::new(config.fetcher.clone())
        .map_err(|e| anyhow::anyhow!("Fetcher setup failed: {}", e))?;

    // Register every site extractor
    let registry = extractors::build_registry(&fetcher)
        .map_err(|e| anyhow::anyhow!("Registry setup failed: {}", e))?;

    tracing::info!(
        countries = registry.supported_countries().len(),
        "Extractor registry built"
    );

    // Exchange rate service with its in-process cache
    let rates = ExchangeRateService::new(reqwest::Client::new(), config.exchange_rate.clone());

    // Create shared application state
    let state = Arc::new(AppState::new(registry, rates, config.clone()));

    // Create application router with middleware
    let app = routes::create_router(state, metrics_handle)
        .layer(middleware::from_fn(observability::track_metrics))
        .layer(CatchPanicLayer::custom(routes::handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Parse socket address
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid SERVER_HOST")?,
        config.server.port,
    ));

    tracing::info!(addr = %addr, "Starting HTTP server");

    // Start the server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listen address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Handles graceful shutdown on SIGTERM or SIGINT.
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
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
