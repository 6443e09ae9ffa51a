//! Checkout saga.
//!
//! `create_order` runs in three passes over the caller's cart replica:
//!
//! 1. **Validate**: every line must name a replicated product with enough
//!    stock. Nothing is written.
//! 2. **Reserve**: each line's stock is decremented with an atomic
//!    conditional adjustment. If any line fails, lines already reserved are
//!    released before the error is returned.
//! 3. **Commit**: the order is persisted, then the new stock levels and the
//!    emptied cart are published.
//!
//! Nothing is published before the order is stored, so a failed checkout
//! leaves no trace on the log. `cancel_order` and `delete_order` claim a
//! `pending` order with a guarded write and then release its stock.

use emporium_broker::BrokerClient;
use emporium_core::clock::Clock;
use emporium_core::command::Command;
use emporium_core::document::{
    Collection, CounterAdjustment, DocumentStore, FieldGuard, decode_document,
};
use emporium_core::envelope::{Envelope, Topic};
use emporium_core::error::DomainError;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::commands::{CancelOrder, CreateOrder, DeleteOrder};
use crate::domain::model::{CartReplica, Order, OrderLine, ProductReplica, StockLevel};
use crate::domain::status::OrderStatus;

const STOCK: &str = "stock";

fn pending_guard() -> FieldGuard {
    FieldGuard::new("status", json!(OrderStatus::Pending.as_str()))
}

/// Places an order for everything in the caller's cart replica.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank shipping address,
/// `DomainError::CartEmpty` if the cart replica is absent or has no lines,
/// `DomainError::ProductNotFound` if a line's product is not replicated,
/// `DomainError::InsufficientStock` if a line asks for more than is in stock,
/// and `DomainError::Infrastructure` on storage failure. On every error path
/// reserved stock has been released and the cart is untouched.
#[instrument(
    skip_all,
    fields(user_id = %command.user_id, correlation_id = %command.correlation_id)
)]
pub async fn create_order(
    command: &CreateOrder,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Order, DomainError> {
    command.shipping_address.validate()?;

    let carts = Collection::<CartReplica>::new(store);
    let mut cart = carts
        .find_one_by("userId", &Value::String(command.user_id.to_string()))
        .await?
        .filter(|cart| !cart.items.is_empty())
        .ok_or(DomainError::CartEmpty(command.user_id))?;

    let products = Collection::<ProductReplica>::new(store);
    for line in &cart.items {
        let product = products
            .find(line.product_id)
            .await?
            .ok_or(DomainError::ProductNotFound(line.product_id))?;
        if product.stock < line.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: line.product_id,
                requested: line.quantity,
                available: product.stock,
            });
        }
    }

    let reserved = reserve(&products, &cart).await?;

    let lines = reserved
        .iter()
        .zip(&cart.items)
        .map(|(product, line)| OrderLine::new(product, line.quantity))
        .collect();
    let order = Order::place(
        command.user_id,
        lines,
        command.shipping_address.clone(),
        command.payment_method,
        clock.now(),
    );
    if let Err(err) = Collection::<Order>::new(store).replace(&order).await {
        release(&products, &order.items).await;
        return Err(err);
    }
    info!(
        command = command.command_type(),
        order_id = %order.id,
        total_amount = order.total_amount,
        lines = order.items.len(),
        "order placed"
    );

    for product in &reserved {
        publish_stock(
            broker,
            StockLevel {
                id: product.id,
                stock: product.stock,
            },
            command.correlation_id(),
        )
        .await;
    }

    cart.items.clear();
    match carts.merge(&cart).await {
        Ok(_) => {
            broker
                .publish_or_log(
                    Topic::OrderCart,
                    &Envelope::Update(cart),
                    command.correlation_id(),
                )
                .await;
        }
        Err(err) => error!(
            order_id = %order.id,
            cart_id = %cart.id,
            error = %err,
            "order placed but cart replica was not cleared"
        ),
    }

    Ok(order)
}

/// Decrements stock for every cart line, in order. Returns the product
/// replicas as they stood right after each reservation.
async fn reserve(
    products: &Collection<'_, ProductReplica>,
    cart: &CartReplica,
) -> Result<Vec<ProductReplica>, DomainError> {
    let mut reserved: Vec<ProductReplica> = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let outcome = products
            .adjust_counter(line.product_id, STOCK, -line.quantity)
            .await
            .and_then(|adjustment| match adjustment {
                CounterAdjustment::Applied(doc) => decode_document::<ProductReplica>(doc),
                CounterAdjustment::Insufficient { available } => {
                    Err(DomainError::InsufficientStock {
                        product_id: line.product_id,
                        requested: line.quantity,
                        available,
                    })
                }
                CounterAdjustment::Missing => Err(DomainError::ProductNotFound(line.product_id)),
            });

        match outcome {
            Ok(product) => reserved.push(product),
            Err(err) => {
                let taken: Vec<(Uuid, i64)> = reserved
                    .iter()
                    .zip(&cart.items)
                    .map(|(product, line)| (product.id, line.quantity))
                    .collect();
                warn!(
                    product_id = %line.product_id,
                    released = taken.len(),
                    error = %err,
                    "stock reservation failed, releasing earlier lines"
                );
                for (product_id, quantity) in taken {
                    restore(products, product_id, quantity).await;
                }
                return Err(err);
            }
        }
    }
    Ok(reserved)
}

/// Gives back the stock held by `lines` without publishing.
async fn release(products: &Collection<'_, ProductReplica>, lines: &[OrderLine]) {
    for line in lines {
        restore(products, line.product_id, line.quantity).await;
    }
}

/// Adds `quantity` back to a product. Returns the new stock level, if the
/// product still exists.
async fn restore(
    products: &Collection<'_, ProductReplica>,
    product_id: Uuid,
    quantity: i64,
) -> Option<StockLevel> {
    match products.adjust_counter(product_id, STOCK, quantity).await {
        Ok(CounterAdjustment::Applied(doc)) => match decode_document::<ProductReplica>(doc) {
            Ok(product) => Some(StockLevel {
                id: product.id,
                stock: product.stock,
            }),
            Err(err) => {
                error!(
                    product_id = %product_id,
                    error = %err,
                    "restocked product does not decode"
                );
                None
            }
        },
        Ok(CounterAdjustment::Missing | CounterAdjustment::Insufficient { .. }) => {
            warn!(
                product_id = %product_id,
                quantity,
                "product no longer replicated, stock not restored"
            );
            None
        }
        Err(err) => {
            error!(
                product_id = %product_id,
                quantity,
                error = %err,
                "failed to restore stock"
            );
            None
        }
    }
}

async fn publish_stock(broker: &BrokerClient, level: StockLevel, correlation_id: Uuid) {
    broker
        .publish_or_log(Topic::OrderProduct, &Envelope::Update(level), correlation_id)
        .await;
}

/// Restocks every line of a claimed order and publishes the new levels.
async fn restock(
    order: &Order,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
    correlation_id: Uuid,
) {
    let products = Collection::<ProductReplica>::new(store);
    for line in &order.items {
        if let Some(level) = restore(&products, line.product_id, line.quantity).await {
            publish_stock(broker, level, correlation_id).await;
        }
    }
}

/// Explains why a pending-only claim on `order_id` failed.
async fn claim_failure(orders: &Collection<'_, Order>, order_id: Uuid) -> DomainError {
    match orders.find(order_id).await {
        Ok(Some(order)) => DomainError::CannotModify {
            order_id,
            status: order.status.as_str().to_owned(),
        },
        Ok(None) => DomainError::OrderNotFound(order_id),
        Err(err) => err,
    }
}

/// Cancels a pending order and releases its stock.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound` if the order does not exist,
/// `DomainError::CannotModify` if it is no longer `pending`, and
/// `DomainError::Infrastructure` on storage failure.
#[instrument(
    skip_all,
    fields(order_id = %command.order_id, correlation_id = %command.correlation_id)
)]
pub async fn cancel_order(
    command: &CancelOrder,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Order, DomainError> {
    let orders = Collection::<Order>::new(store);
    let patch = json!({
        "status": OrderStatus::Cancelled.as_str(),
        "updatedAt": clock.now(),
    });
    let Some(order) = orders
        .merge_if(command.order_id, &pending_guard(), patch)
        .await?
    else {
        return Err(claim_failure(&orders, command.order_id).await);
    };
    info!(
        command = command.command_type(),
        order_id = %order.id,
        "order cancelled"
    );

    restock(&order, store, broker, command.correlation_id).await;
    Ok(order)
}

/// Deletes a pending order and releases its stock.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound` if the order does not exist,
/// `DomainError::CannotModify` if it is no longer `pending`, and
/// `DomainError::Infrastructure` on storage failure.
#[instrument(
    skip_all,
    fields(order_id = %command.order_id, correlation_id = %command.correlation_id)
)]
pub async fn delete_order(
    command: &DeleteOrder,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<(), DomainError> {
    let orders = Collection::<Order>::new(store);
    let order = orders
        .find(command.order_id)
        .await?
        .ok_or(DomainError::OrderNotFound(command.order_id))?;
    if !orders.delete_if(order.id, &pending_guard()).await? {
        return Err(claim_failure(&orders, order.id).await);
    }
    info!(
        command = command.command_type(),
        order_id = %order.id,
        "order deleted"
    );

    restock(&order, store, broker, command.correlation_id).await;
    Ok(())
}
