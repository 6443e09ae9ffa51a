//! Emporium API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use emporium_api::config::AppConfig;
use emporium_api::error::AppError;
use emporium_api::server;
use emporium_api::state::AppState;
use emporium_api::telemetry;
use emporium_core::clock::SystemClock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let tracer_provider =
        telemetry::init(config.service.name(), config.otlp_endpoint.as_deref())?;

    tracing::info!(
        service = %config.service,
        client_id = %config.client_id,
        "Starting Emporium API server"
    );

    let store = server::connect_store(&config).await?;
    let broker = server::connect_broker(&config)?;
    let app_state = AppState::new(store, broker, Arc::new(SystemClock));

    let consumers = server::start_consumers(config.service, &app_state).await;
    tracing::info!(consumers = consumers.len(), "consumers started");

    let app = server::build_router(config.service, app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for consumer in &consumers {
        consumer.abort();
    }
    if let Some(provider) = tracer_provider {
        if let Err(err) = provider.shutdown() {
            tracing::error!(error = %err, "failed to flush trace exporter");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
