//! Consumers owned by the cart service.

use std::sync::Arc;

use emporium_broker::{BrokerClient, ConsumerHandle};
use emporium_core::document::DocumentStore;
use emporium_core::envelope::Topic;
use emporium_replica::start_projection;

use crate::domain::model::{CartContents, ProductReplica};

/// Consumer-group purpose for the product replica.
pub const PRODUCT_REPLICA_PURPOSE: &str = "product-replica";
/// Consumer-group purpose for carts emptied by the order saga.
pub const ORDER_CART_PURPOSE: &str = "order-cart";

/// Starts every consumer of the cart service.
pub async fn start(broker: &BrokerClient, store: Arc<dyn DocumentStore>) -> Vec<ConsumerHandle> {
    let mut handles = Vec::new();
    handles.extend(
        start_projection::<ProductReplica>(
            broker,
            Arc::clone(&store),
            Topic::Product,
            PRODUCT_REPLICA_PURPOSE,
        )
        .await,
    );
    handles.extend(
        start_projection::<CartContents>(broker, store, Topic::OrderCart, ORDER_CART_PURPOSE)
            .await,
    );
    handles
}
