//! Commands for the Cart context.

use emporium_core::command::Command;
use uuid::Uuid;

/// Command to add units of a product to the caller's cart.
#[derive(Debug, Clone)]
pub struct AddCartItem {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The cart owner.
    pub user_id: Uuid,
    /// The product to add.
    pub product_id: Uuid,
    /// Units to add, at least one.
    pub quantity: i64,
}

impl Command for AddCartItem {
    fn command_type(&self) -> &'static str {
        "cart.add_item"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to set the quantity of an existing line.
#[derive(Debug, Clone)]
pub struct SetCartItemQuantity {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The cart owner.
    pub user_id: Uuid,
    /// The product whose line changes.
    pub product_id: Uuid,
    /// New quantity, at least one.
    pub quantity: i64,
}

impl Command for SetCartItemQuantity {
    fn command_type(&self) -> &'static str {
        "cart.set_item_quantity"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a line.
#[derive(Debug, Clone)]
pub struct RemoveCartItem {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The cart owner.
    pub user_id: Uuid,
    /// The product whose line is removed.
    pub product_id: Uuid,
}

impl Command for RemoveCartItem {
    fn command_type(&self) -> &'static str {
        "cart.remove_item"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to empty the caller's cart.
#[derive(Debug, Clone)]
pub struct ClearCart {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The cart owner.
    pub user_id: Uuid,
}

impl Command for ClearCart {
    fn command_type(&self) -> &'static str {
        "cart.clear"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
