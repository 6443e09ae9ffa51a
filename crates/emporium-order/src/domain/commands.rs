//! Commands for the Order context.

use emporium_core::command::Command;
use uuid::Uuid;

use crate::domain::model::ShippingAddress;
use crate::domain::status::{OrderStatus, PaymentMethod};

/// Command to check out the caller's cart.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer whose cart replica is ordered.
    pub user_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

impl Command for CreateOrder {
    fn command_type(&self) -> &'static str {
        "order.create_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to cancel a pending order and release its stock.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub order_id: Uuid,
}

impl Command for CancelOrder {
    fn command_type(&self) -> &'static str {
        "order.cancel_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete a pending order and release its stock.
#[derive(Debug, Clone)]
pub struct DeleteOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub order_id: Uuid,
}

impl Command for DeleteOrder {
    fn command_type(&self) -> &'static str {
        "order.delete_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Administrative command to move an order through its lifecycle.
#[derive(Debug, Clone)]
pub struct ChangeOrderStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub order_id: Uuid,
    /// The requested next status.
    pub status: OrderStatus,
}

impl Command for ChangeOrderStatus {
    fn command_type(&self) -> &'static str {
        "order.change_status"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to record payment for an order.
#[derive(Debug, Clone)]
pub struct MarkOrderPaid {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub order_id: Uuid,
}

impl Command for MarkOrderPaid {
    fn command_type(&self) -> &'static str {
        "order.mark_paid"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
