//! Cart documents and the product replica.

use chrono::{DateTime, Utc};
use emporium_core::document::Document;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    /// Always at least one.
    pub quantity: i64,
}

/// The authoritative cart, unique per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Lines in insertion order.
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// An empty cart for `user_id`.
    #[must_use]
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Quantity currently held for `product_id` (zero if absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: Uuid) -> i64 {
        self.line(product_id).map_or(0, |item| item.quantity)
    }

    /// The line for `product_id`.
    #[must_use]
    pub fn line(&self, product_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Sets the quantity for `product_id`, appending a new line if needed.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: i64) {
        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            Some(item) => item.quantity = quantity,
            None => self.items.push(CartItem {
                product_id,
                quantity,
            }),
        }
    }

    /// Removes the line for `product_id`. Returns `true` if it existed.
    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }
}

impl Document for Cart {
    const COLLECTION: &'static str = "carts";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Cart contents written back by the order saga after a successful order.
/// Projected onto the authoritative cart, replacing only `items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartContents {
    pub id: Uuid,
    pub items: Vec<CartItem>,
}

impl Document for CartContents {
    const COLLECTION: &'static str = Cart::COLLECTION;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Local copy of a catalogue product, as published on `Product-Topic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReplica {
    pub id: Uuid,
    pub title: String,
    pub price: i64,
    pub discounted_price: i64,
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Document for ProductReplica {
    const COLLECTION: &'static str = "product_replicas";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_quantity_merges_existing_line() {
        let mut cart = Cart::new(Uuid::new_v4(), Utc::now());
        let lamp = Uuid::new_v4();
        let chair = Uuid::new_v4();

        cart.set_quantity(lamp, 1);
        cart.set_quantity(chair, 2);
        cart.set_quantity(lamp, 3);

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.quantity_of(lamp), 3);
        assert_eq!(cart.items[0].product_id, lamp);
    }

    #[test]
    fn test_remove_reports_missing_line() {
        let mut cart = Cart::new(Uuid::new_v4(), Utc::now());
        let lamp = Uuid::new_v4();
        cart.set_quantity(lamp, 1);

        assert!(cart.remove(lamp));
        assert!(!cart.remove(lamp));
        assert_eq!(cart.quantity_of(lamp), 0);
    }

    #[test]
    fn test_contents_projection_touches_only_items() {
        let contents = CartContents {
            id: Uuid::new_v4(),
            items: vec![],
        };

        let json = serde_json::to_value(contents).unwrap();

        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["id".to_owned(), "items".to_owned()]);
    }
}
