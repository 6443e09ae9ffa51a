//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type shared by every service.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A document owned by the current service was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity name (for example `product`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: Uuid,
    },

    /// The caller's cart replica is missing or holds no items.
    #[error("cart is empty for user {0}")]
    CartEmpty(Uuid),

    /// A cart line references a product missing from the local replica.
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    /// A cart line requests more units than the product has in stock.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// The offending product.
        product_id: Uuid,
        /// Units requested by the cart line.
        requested: i64,
        /// Units available when the check ran.
        available: i64,
    },

    /// The order is not in a state that allows cancellation or deletion.
    #[error("order {order_id} cannot be modified in status {status}")]
    CannotModify {
        /// The order that was targeted.
        order_id: Uuid,
        /// Its current status.
        status: String,
    },

    /// The targeted order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors that may succeed when retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}
