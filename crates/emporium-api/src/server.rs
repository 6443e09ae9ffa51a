//! Process wiring: store, broker, router and consumers for one service.

use std::sync::Arc;

use axum::Router;
use emporium_broker::{
    Broker, BrokerClient, BrokerConfig, BrokerDeadLetterSink, ConsumerHandle, InMemoryBroker,
};
use emporium_cart::application::replication as cart_replication;
use emporium_core::document::DocumentStore;
use emporium_order::application::replication as order_replication;
use emporium_product::application::replication as product_replication;
use emporium_store::{MemoryDocumentStore, PgDocumentStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::{AppConfig, Service};
use crate::error::AppError;
use crate::routes;
use crate::state::AppState;

/// Opens the configured document store, running migrations for Postgres.
///
/// # Errors
///
/// Returns `AppError::Database` or `AppError::Migration` if Postgres is
/// configured but unusable.
pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>, AppError> {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set, documents are kept in memory");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("document store migrations applied");

    Ok(Arc::new(PgDocumentStore::new(pool)))
}

/// Creates the process-wide broker client.
///
/// # Errors
///
/// Returns `AppError::Broker` if the Kafka producer cannot be created.
pub fn connect_broker(config: &AppConfig) -> Result<BrokerClient, AppError> {
    let broker_config = BrokerConfig::new(config.client_id.clone())
        .with_publish_timeout(config.publish_timeout)
        .with_handler_timeout(config.handler_timeout);

    let (broker, broker_config) = transport(config, broker_config)?;
    let dead_letters = Arc::new(BrokerDeadLetterSink::new(Arc::clone(&broker)));
    Ok(BrokerClient::new(broker, broker_config, dead_letters))
}

#[cfg(feature = "kafka")]
fn transport(
    config: &AppConfig,
    broker_config: BrokerConfig,
) -> Result<(Arc<dyn Broker>, BrokerConfig), AppError> {
    let Some(servers) = config.broker_url.as_deref() else {
        warn!("BROKER_URL not set, using the process-local log");
        return Ok((Arc::new(InMemoryBroker::new()), broker_config));
    };
    let broker_config = broker_config.with_bootstrap_servers(servers);
    let broker = emporium_broker::KafkaBroker::new(&broker_config)?;
    info!(bootstrap_servers = servers, "kafka broker configured");
    Ok((Arc::new(broker), broker_config))
}

#[cfg(not(feature = "kafka"))]
#[allow(clippy::unnecessary_wraps)]
fn transport(
    config: &AppConfig,
    broker_config: BrokerConfig,
) -> Result<(Arc<dyn Broker>, BrokerConfig), AppError> {
    if config.broker_url.is_some() {
        warn!("BROKER_URL ignored, built without the kafka feature");
    } else {
        warn!("BROKER_URL not set, using the process-local log");
    }
    Ok((Arc::new(InMemoryBroker::new()), broker_config))
}

/// Health check plus the routes of `service`, mounted under its prefix.
pub fn build_router(service: Service, state: AppState) -> Router {
    let service_routes = match service {
        Service::Product => routes::product::router(),
        Service::User => routes::user::router(),
        Service::Cart => routes::cart::router(),
        Service::Order => routes::order::router(),
    };

    Router::new()
        .merge(routes::health::router())
        .nest(service.mount_path(), service_routes)
        .with_state(state)
}

/// Starts the consumer groups owned by `service`.
pub async fn start_consumers(service: Service, state: &AppState) -> Vec<ConsumerHandle> {
    let store = Arc::clone(&state.store);
    match service {
        Service::Product => product_replication::start(&state.broker, store).await,
        Service::User => Vec::new(),
        Service::Cart => cart_replication::start(&state.broker, store).await,
        Service::Order => order_replication::start(&state.broker, store).await,
    }
}
