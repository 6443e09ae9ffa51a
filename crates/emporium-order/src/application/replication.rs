//! Consumers owned by the order service.

use std::sync::Arc;

use emporium_broker::{BrokerClient, ConsumerHandle};
use emporium_core::document::DocumentStore;
use emporium_core::envelope::Topic;
use emporium_replica::start_projection;

use crate::domain::model::{CartReplica, ProductReplica, UserReplica};

pub const PRODUCT_REPLICA_PURPOSE: &str = "product-replica";
pub const CART_REPLICA_PURPOSE: &str = "cart-replica";
pub const USER_REPLICA_PURPOSE: &str = "user-replica";

/// Starts the product, cart and user replicas.
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
        start_projection::<CartReplica>(
            broker,
            Arc::clone(&store),
            Topic::Cart,
            CART_REPLICA_PURPOSE,
        )
        .await,
    );
    handles.extend(
        start_projection::<UserReplica>(broker, store, Topic::User, USER_REPLICA_PURPOSE).await,
    );
    handles
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use emporium_broker::{Broker, InMemoryBroker};
    use emporium_core::document::Collection;
    use emporium_core::envelope::{EventKind, RawEnvelope};
    use emporium_store::MemoryDocumentStore;
    use emporium_test_support::in_memory_client;
    use serde_json::{Value, json};
    use uuid::Uuid;

    use super::*;

    async fn send(broker: &InMemoryBroker, topic: Topic, kind: EventKind, payload: Value) {
        let raw = RawEnvelope {
            message_id: Uuid::new_v4(),
            kind,
            topic: topic.as_str().to_owned(),
            payload,
            correlation_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        };
        broker
            .publish(topic.as_str(), kind.as_str(), raw.to_bytes().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_registers_three_consumer_groups() {
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "order-service");

        let handles = start(&client, Arc::new(MemoryDocumentStore::new())).await;

        let groups: Vec<_> = handles.iter().map(|h| h.group_id().to_owned()).collect();
        assert_eq!(
            groups,
            vec![
                "order-service-product-replica".to_owned(),
                "order-service-cart-replica".to_owned(),
                "order-service-user-replica".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_cart_and_user_snapshots_are_replicated() {
        // Arrange
        let store = Arc::new(MemoryDocumentStore::new());
        let broker = InMemoryBroker::new();
        start(&in_memory_client(&broker, "order-service"), store.clone()).await;
        let user_id = Uuid::new_v4();
        let cart_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        // Act
        send(
            &broker,
            Topic::User,
            EventKind::Create,
            json!({
                "id": user_id,
                "name": "Ada",
                "email": "ada@example.com",
                "role": "user",
                "phone": null,
                "avatar": null
            }),
        )
        .await;
        send(
            &broker,
            Topic::Cart,
            EventKind::Create,
            json!({
                "id": cart_id,
                "userId": user_id,
                "items": [{ "productId": product_id, "quantity": 1 }],
                "createdAt": "2026-01-15T10:00:00Z",
                "updatedAt": "2026-01-15T10:00:00Z"
            }),
        )
        .await;
        send(
            &broker,
            Topic::Cart,
            EventKind::Update,
            json!({
                "id": cart_id,
                "userId": user_id,
                "items": [{ "productId": product_id, "quantity": 4 }]
            }),
        )
        .await;
        assert!(broker.settle(Duration::from_secs(2)).await);

        // Assert
        let user = Collection::<UserReplica>::new(store.as_ref())
            .find(user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        let cart = Collection::<CartReplica>::new(store.as_ref())
            .find(cart_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cart.user_id, user_id);
        assert_eq!(cart.items[0].quantity, 4);
    }
}
