//! Command handlers for the Cart context.
//!
//! Quantities are checked against the local product replica, which may lag
//! the catalogue. The order saga re-checks stock against its own replica.

use emporium_broker::BrokerClient;
use emporium_core::clock::Clock;
use emporium_core::command::Command;
use emporium_core::document::{Collection, DocumentStore};
use emporium_core::envelope::{Envelope, Topic};
use emporium_core::error::DomainError;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::commands::{AddCartItem, ClearCart, RemoveCartItem, SetCartItemQuantity};
use crate::domain::model::{Cart, ProductReplica};

/// Loads the cart belonging to `user_id`, if any.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` on storage failure.
pub async fn find_cart(
    store: &dyn DocumentStore,
    user_id: Uuid,
) -> Result<Option<Cart>, DomainError> {
    Collection::<Cart>::new(store)
        .find_one_by("userId", &Value::String(user_id.to_string()))
        .await
}

async fn require_cart(store: &dyn DocumentStore, user_id: Uuid) -> Result<Cart, DomainError> {
    find_cart(store, user_id).await?.ok_or(DomainError::NotFound {
        entity: "cart",
        id: user_id,
    })
}

fn require_positive(quantity: i64) -> Result<(), DomainError> {
    if quantity < 1 {
        return Err(DomainError::Validation(
            "quantity must be at least 1".into(),
        ));
    }
    Ok(())
}

async fn check_stock(
    store: &dyn DocumentStore,
    product_id: Uuid,
    requested: i64,
) -> Result<(), DomainError> {
    let product = Collection::<ProductReplica>::new(store)
        .find(product_id)
        .await?
        .ok_or(DomainError::ProductNotFound(product_id))?;
    if product.stock < requested {
        return Err(DomainError::InsufficientStock {
            product_id,
            requested,
            available: product.stock,
        });
    }
    Ok(())
}

async fn save_and_publish(
    cart: &Cart,
    created: bool,
    command: &dyn Command,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<(), DomainError> {
    Collection::<Cart>::new(store).replace(cart).await?;
    info!(
        command = command.command_type(),
        cart_id = %cart.id,
        user_id = %cart.user_id,
        lines = cart.items.len(),
        "cart saved"
    );

    let envelope = if created {
        Envelope::Create(cart.clone())
    } else {
        Envelope::Update(cart.clone())
    };
    broker
        .publish_or_log(Topic::Cart, &envelope, command.correlation_id())
        .await;
    Ok(())
}

/// Handles the `AddCartItem` command: creates the cart on first use and
/// merges the quantity into an existing line.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a quantity below one,
/// `DomainError::ProductNotFound` if the product is not in the replica,
/// `DomainError::InsufficientStock` if the resulting quantity exceeds the
/// replica's stock, and `DomainError::Infrastructure` on storage failure.
pub async fn handle_add_cart_item(
    command: &AddCartItem,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Cart, DomainError> {
    require_positive(command.quantity)?;
    let existing = find_cart(store, command.user_id).await?;
    let created = existing.is_none();
    let mut cart = existing.unwrap_or_else(|| Cart::new(command.user_id, clock.now()));

    let quantity = cart.quantity_of(command.product_id) + command.quantity;
    check_stock(store, command.product_id, quantity).await?;

    cart.set_quantity(command.product_id, quantity);
    cart.updated_at = clock.now();
    save_and_publish(&cart, created, command, store, broker).await?;
    Ok(cart)
}

/// Handles the `SetCartItemQuantity` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a quantity below one,
/// `DomainError::NotFound` if the cart or line does not exist, the same stock
/// errors as [`handle_add_cart_item`], and `DomainError::Infrastructure` on
/// storage failure.
pub async fn handle_set_cart_item_quantity(
    command: &SetCartItemQuantity,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Cart, DomainError> {
    require_positive(command.quantity)?;
    let mut cart = require_cart(store, command.user_id).await?;
    if cart.line(command.product_id).is_none() {
        return Err(DomainError::NotFound {
            entity: "cart item",
            id: command.product_id,
        });
    }
    check_stock(store, command.product_id, command.quantity).await?;

    cart.set_quantity(command.product_id, command.quantity);
    cart.updated_at = clock.now();
    save_and_publish(&cart, false, command, store, broker).await?;
    Ok(cart)
}

/// Handles the `RemoveCartItem` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the cart or line does not exist and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_remove_cart_item(
    command: &RemoveCartItem,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Cart, DomainError> {
    let mut cart = require_cart(store, command.user_id).await?;
    if !cart.remove(command.product_id) {
        return Err(DomainError::NotFound {
            entity: "cart item",
            id: command.product_id,
        });
    }
    cart.updated_at = clock.now();
    save_and_publish(&cart, false, command, store, broker).await?;
    Ok(cart)
}

/// Handles the `ClearCart` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user has no cart and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_clear_cart(
    command: &ClearCart,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Cart, DomainError> {
    let mut cart = require_cart(store, command.user_id).await?;
    cart.items.clear();
    cart.updated_at = clock.now();
    save_and_publish(&cart, false, command, store, broker).await?;
    Ok(cart)
}
