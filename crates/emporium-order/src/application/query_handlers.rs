//! Query handlers for the Order context.

use emporium_core::document::{Collection, DocumentStore};
use emporium_core::error::DomainError;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::model::{Order, UserReplica};

/// Customer details joined from the user replica.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

/// An order with its customer, when the user has been replicated.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Customer>,
}

/// Retrieves an order by ID.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound` if the order does not exist and
/// `DomainError::Infrastructure` on storage failure.
pub async fn get_order(
    order_id: Uuid,
    store: &dyn DocumentStore,
) -> Result<OrderView, DomainError> {
    let order = Collection::<Order>::new(store)
        .find(order_id)
        .await?
        .ok_or(DomainError::OrderNotFound(order_id))?;
    let customer = Collection::<UserReplica>::new(store)
        .find(order.user_id)
        .await?
        .map(|user| Customer {
            name: user.name,
            email: user.email,
        });
    Ok(OrderView { order, customer })
}

/// Lists a user's orders, newest first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` on storage failure.
pub async fn list_orders_for_user(
    user_id: Uuid,
    store: &dyn DocumentStore,
) -> Result<Vec<Order>, DomainError> {
    let mut orders: Vec<Order> = Collection::<Order>::new(store)
        .find_all()
        .await?
        .into_iter()
        .filter(|order| order.user_id == user_id)
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
}
