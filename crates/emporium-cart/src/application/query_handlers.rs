//! Query handlers for the Cart context.

use emporium_core::document::{Collection, DocumentStore};
use emporium_core::error::DomainError;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers::find_cart;
use crate::domain::model::ProductReplica;

/// A cart line joined with the replicated product, when known.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product_id: Uuid,
    pub quantity: i64,
    /// `None` when the product is missing from the local replica.
    pub title: Option<String>,
    pub unit_price: Option<i64>,
    pub line_total: Option<i64>,
    pub in_stock: bool,
}

/// Read-only view of a user's cart.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLineView>,
    /// Sum of the known line totals.
    pub total: i64,
}

/// Retrieves the caller's cart, priced from the product replica.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user has no cart and
/// `DomainError::Infrastructure` on storage failure.
pub async fn get_cart(user_id: Uuid, store: &dyn DocumentStore) -> Result<CartView, DomainError> {
    let cart = find_cart(store, user_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "cart",
            id: user_id,
        })?;

    let products = Collection::<ProductReplica>::new(store);
    let mut items = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        let product = products.find(item.product_id).await?;
        items.push(CartLineView {
            product_id: item.product_id,
            quantity: item.quantity,
            title: product.as_ref().map(|p| p.title.clone()),
            unit_price: product.as_ref().map(|p| p.discounted_price),
            line_total: product.as_ref().map(|p| p.discounted_price * item.quantity),
            in_stock: product.as_ref().is_some_and(|p| p.stock >= item.quantity),
        });
    }
    let total = items.iter().filter_map(|line| line.line_total).sum();

    Ok(CartView {
        id: cart.id,
        user_id: cart.user_id,
        items,
        total,
    })
}
