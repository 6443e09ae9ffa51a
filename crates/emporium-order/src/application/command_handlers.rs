//! Administrative order commands.
//!
//! Status writes are guarded on the status the decision was made from, so a
//! concurrent cancellation or transition makes the later write fail with
//! `CannotModify` instead of silently overwriting it.

use emporium_broker::BrokerClient;
use emporium_core::clock::Clock;
use emporium_core::command::Command;
use emporium_core::document::{Collection, DocumentStore, FieldGuard};
use emporium_core::error::DomainError;
use serde_json::{Map, Value, json};
use tracing::info;
use uuid::Uuid;

use crate::application::saga;
use crate::domain::commands::{CancelOrder, ChangeOrderStatus, MarkOrderPaid};
use crate::domain::model::Order;
use crate::domain::status::OrderStatus;

async fn load(orders: &Collection<'_, Order>, order_id: Uuid) -> Result<Order, DomainError> {
    orders
        .find(order_id)
        .await?
        .ok_or(DomainError::OrderNotFound(order_id))
}

fn cannot_modify(order: &Order) -> DomainError {
    DomainError::CannotModify {
        order_id: order.id,
        status: order.status.as_str().to_owned(),
    }
}

/// Handles the `ChangeOrderStatus` command.
///
/// Cancelling a `pending` order goes through the saga and releases its
/// stock. Later cancellations only record the status.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound` if the order does not exist,
/// `DomainError::CannotModify` if the transition is not allowed from the
/// current status, and `DomainError::Infrastructure` on storage failure.
pub async fn handle_change_order_status(
    command: &ChangeOrderStatus,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Order, DomainError> {
    let orders = Collection::<Order>::new(store);
    let order = load(&orders, command.order_id).await?;
    if !order.status.can_transition_to(command.status) {
        return Err(cannot_modify(&order));
    }

    if order.status == OrderStatus::Pending && command.status == OrderStatus::Cancelled {
        return saga::cancel_order(
            &CancelOrder {
                correlation_id: command.correlation_id,
                order_id: command.order_id,
            },
            clock,
            store,
            broker,
        )
        .await;
    }

    let now = clock.now();
    let mut patch = Map::new();
    patch.insert("status".into(), json!(command.status.as_str()));
    patch.insert("updatedAt".into(), json!(now));
    if command.status == OrderStatus::Delivered {
        patch.insert("isDelivered".into(), Value::Bool(true));
        patch.insert("deliveredAt".into(), json!(now));
    }

    let guard = FieldGuard::new("status", json!(order.status.as_str()));
    let Some(updated) = orders
        .merge_if(order.id, &guard, Value::Object(patch))
        .await?
    else {
        let current = load(&orders, order.id).await?;
        return Err(cannot_modify(&current));
    };
    info!(
        command = command.command_type(),
        order_id = %updated.id,
        from = %order.status,
        to = %updated.status,
        "order status changed"
    );
    Ok(updated)
}

/// Handles the `MarkOrderPaid` command. Marking a paid order again is a
/// no-op.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound` if the order does not exist,
/// `DomainError::CannotModify` if it was cancelled, and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_mark_order_paid(
    command: &MarkOrderPaid,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
) -> Result<Order, DomainError> {
    let orders = Collection::<Order>::new(store);
    let order = load(&orders, command.order_id).await?;
    if order.status == OrderStatus::Cancelled {
        return Err(cannot_modify(&order));
    }
    if order.is_paid {
        return Ok(order);
    }

    let now = clock.now();
    let patch = json!({ "isPaid": true, "paidAt": now, "updatedAt": now });
    match orders
        .merge_if(order.id, &FieldGuard::new("isPaid", Value::Bool(false)), patch)
        .await?
    {
        Some(updated) => {
            info!(
                command = command.command_type(),
                order_id = %updated.id,
                "order marked paid"
            );
            Ok(updated)
        }
        None => load(&orders, order.id).await,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use emporium_broker::InMemoryBroker;
    use emporium_store::MemoryDocumentStore;
    use emporium_test_support::{FixedClock, in_memory_client};

    use super::*;
    use crate::domain::model::{OrderLine, ProductReplica, ShippingAddress};
    use crate::domain::status::PaymentMethod;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    async fn seed_order(store: &MemoryDocumentStore, stock_left: i64) -> (Order, Uuid) {
        let product = ProductReplica {
            id: Uuid::new_v4(),
            title: "Desk lamp".into(),
            price: 100,
            discounted_price: 100,
            stock: stock_left,
        };
        Collection::<ProductReplica>::new(store)
            .replace(&product)
            .await
            .unwrap();
        let order = Order::place(
            Uuid::new_v4(),
            vec![OrderLine::new(&product, 2)],
            ShippingAddress {
                street: "1 Main St".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                detail: None,
            },
            PaymentMethod::Cod,
            clock().now(),
        );
        Collection::<Order>::new(store).replace(&order).await.unwrap();
        (order, product.id)
    }

    fn change(order_id: Uuid, status: OrderStatus) -> ChangeOrderStatus {
        ChangeOrderStatus {
            correlation_id: Uuid::new_v4(),
            order_id,
            status,
        }
    }

    async fn stock_of(store: &MemoryDocumentStore, product_id: Uuid) -> i64 {
        Collection::<ProductReplica>::new(store)
            .find(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn test_ship_then_deliver_records_delivery() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let client = in_memory_client(&InMemoryBroker::new(), "order-service");
        let (order, _) = seed_order(&store, 3).await;

        // Act
        let shipped = handle_change_order_status(
            &change(order.id, OrderStatus::Shipped),
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();
        let delivered = handle_change_order_status(
            &change(order.id, OrderStatus::Delivered),
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert!(!shipped.is_delivered);
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert!(delivered.is_delivered);
        assert_eq!(delivered.delivered_at, Some(clock().now()));
    }

    #[tokio::test]
    async fn test_illegal_transition_is_cannot_modify() {
        let store = MemoryDocumentStore::new();
        let client = in_memory_client(&InMemoryBroker::new(), "order-service");
        let (order, _) = seed_order(&store, 3).await;

        let result = handle_change_order_status(
            &change(order.id, OrderStatus::Delivered),
            &clock(),
            &store,
            &client,
        )
        .await;

        match result.unwrap_err() {
            DomainError::CannotModify { status, .. } => assert_eq!(status, "pending"),
            other => panic!("expected CannotModify, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelling_pending_order_restocks_through_saga() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "order-service");
        let (order, product_id) = seed_order(&store, 3).await;

        // Act
        let cancelled = handle_change_order_status(
            &change(order.id, OrderStatus::Cancelled),
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&store, product_id).await, 5);
        assert_eq!(broker.envelopes("Order-Topic-Product").await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelling_shipped_order_keeps_stock() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "order-service");
        let (order, product_id) = seed_order(&store, 3).await;
        handle_change_order_status(
            &change(order.id, OrderStatus::Shipped),
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();

        // Act
        let cancelled = handle_change_order_status(
            &change(order.id, OrderStatus::Cancelled),
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&store, product_id).await, 3);
        assert!(broker.envelopes("Order-Topic-Product").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_order_is_order_not_found() {
        let store = MemoryDocumentStore::new();
        let client = in_memory_client(&InMemoryBroker::new(), "order-service");

        let result = handle_change_order_status(
            &change(Uuid::new_v4(), OrderStatus::Shipped),
            &clock(),
            &store,
            &client,
        )
        .await;

        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_paid_sets_flag_once() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let (order, _) = seed_order(&store, 3).await;
        let command = MarkOrderPaid {
            correlation_id: Uuid::new_v4(),
            order_id: order.id,
        };

        // Act
        let paid = handle_mark_order_paid(&command, &clock(), &store).await.unwrap();
        let again = handle_mark_order_paid(&command, &clock(), &store).await.unwrap();

        // Assert
        assert!(paid.is_paid);
        assert_eq!(paid.paid_at, Some(clock().now()));
        assert_eq!(again, paid);
    }

    #[tokio::test]
    async fn test_mark_paid_rejects_cancelled_order() {
        let store = MemoryDocumentStore::new();
        let client = in_memory_client(&InMemoryBroker::new(), "order-service");
        let (order, _) = seed_order(&store, 3).await;
        handle_change_order_status(
            &change(order.id, OrderStatus::Cancelled),
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();

        let result = handle_mark_order_paid(
            &MarkOrderPaid {
                correlation_id: Uuid::new_v4(),
                order_id: order.id,
            },
            &clock(),
            &store,
        )
        .await;

        assert!(matches!(result, Err(DomainError::CannotModify { .. })));
    }
}
