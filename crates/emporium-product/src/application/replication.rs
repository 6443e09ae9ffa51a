//! Consumers owned by the product service.
//!
//! The order saga publishes the post-reservation stock of each product on
//! `Order-Topic-Product`; only the `stock` field of the authoritative product
//! is updated from it. Each applied change is republished on `Product-Topic`
//! so the cart and order replicas follow the new stock.

use std::sync::Arc;

use async_trait::async_trait;
use emporium_broker::{BrokerClient, ConsumerHandle, EnvelopeHandler};
use emporium_core::document::{Collection, DocumentStore};
use emporium_core::envelope::{Envelope, RawEnvelope, Topic};
use emporium_replica::{ProjectionOutcome, ReplicaProjector};
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::model::{Product, StockLevel};

/// Consumer-group purpose for stock changes made by the order saga.
pub const ORDER_STOCK_PURPOSE: &str = "order-stock";

/// Applies saga stock levels to products and republishes the result.
pub struct StockProjector {
    projector: ReplicaProjector<StockLevel>,
    store: Arc<dyn DocumentStore>,
    broker: BrokerClient,
}

impl StockProjector {
    /// Creates the projector for the `order-stock` consumer group.
    #[must_use]
    pub fn new(broker: &BrokerClient, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            projector: ReplicaProjector::new(
                Arc::clone(&store),
                broker.consumer_group(ORDER_STOCK_PURPOSE),
                broker.dead_letters(),
            ),
            store,
            broker: broker.clone(),
        }
    }

    async fn republish(&self, product_id: Uuid, correlation_id: Uuid) {
        match Collection::<Product>::new(self.store.as_ref())
            .find(product_id)
            .await
        {
            Ok(Some(product)) => {
                self.broker
                    .publish_or_log(Topic::Product, &Envelope::Update(product), correlation_id)
                    .await;
            }
            Ok(None) => warn!(
                product_id = %product_id,
                "product removed before its stock change could be republished"
            ),
            Err(err) => error!(
                product_id = %product_id,
                error = %err,
                "failed to load product for stock republication"
            ),
        }
    }
}

#[async_trait]
impl EnvelopeHandler for StockProjector {
    async fn handle(&self, envelope: RawEnvelope) {
        let product_id = envelope.identifier();
        let correlation_id = envelope.correlation_id;
        let outcome = self.projector.project(envelope).await;
        if let (Some(ProjectionOutcome::Merged), Some(product_id)) = (outcome, product_id) {
            self.republish(product_id, correlation_id).await;
        }
    }
}

/// Starts every consumer of the product service.
pub async fn start(broker: &BrokerClient, store: Arc<dyn DocumentStore>) -> Vec<ConsumerHandle> {
    let stock = Arc::new(StockProjector::new(broker, store));
    broker
        .subscribe(Topic::OrderProduct, ORDER_STOCK_PURPOSE, stock)
        .await
        .into_iter()
        .collect()
}
