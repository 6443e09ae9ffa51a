//! Order documents and the replicas the order service keeps.

use chrono::{DateTime, Utc};
use emporium_core::document::Document;
use emporium_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::status::{OrderStatus, PaymentMethod};

/// Local copy of a catalogue product. The saga reserves stock here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReplica {
    pub id: Uuid,
    pub title: String,
    pub price: i64,
    pub discounted_price: i64,
    pub stock: i64,
}

impl Document for ProductReplica {
    const COLLECTION: &'static str = "product_replicas";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Stock level of one product, published on `Order-Topic-Product` after a
/// reservation or a restock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub id: Uuid,
    pub stock: i64,
}

impl Document for StockLevel {
    const COLLECTION: &'static str = ProductReplica::COLLECTION;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Local copy of a user's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartReplica {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub items: Vec<CartLine>,
}

impl Document for CartReplica {
    const COLLECTION: &'static str = "cart_replicas";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Local copy of the public part of a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReplica {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Document for UserReplica {
    const COLLECTION: &'static str = "user_replicas";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Delivery address of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ShippingAddress {
    /// Street, city and state must be non-blank.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first blank field.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::Validation(format!(
                    "shipping address {field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// A purchased line, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    /// `unit_price * quantity`.
    pub price: i64,
}

impl OrderLine {
    #[must_use]
    pub fn new(product: &ProductReplica, quantity: i64) -> Self {
        Self {
            product_id: product.id,
            name: product.title.clone(),
            quantity,
            unit_price: product.discounted_price,
            price: product.discounted_price * quantity,
        }
    }
}

/// The authoritative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A new `pending` order over `items`.
    #[must_use]
    pub fn place(
        user_id: Uuid,
        items: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        let total_amount = items.iter().map(|line| line.price).sum();
        Self {
            id: Uuid::new_v4(),
            user_id,
            items,
            shipping_address,
            total_amount,
            status: OrderStatus::Pending,
            payment_method,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> Uuid {
        self.id
    }
}
