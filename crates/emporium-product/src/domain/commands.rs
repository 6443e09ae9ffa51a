//! Commands for the Product context.

use emporium_core::command::Command;
use uuid::Uuid;

use super::model::{ProductChanges, ProductDetails};

/// Command to create a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new product's fields.
    pub details: ProductDetails,
}

impl Command for CreateProduct {
    fn command_type(&self) -> &'static str {
        "product.create_product"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to change some fields of a product.
#[derive(Debug, Clone)]
pub struct UpdateProduct {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The product identifier.
    pub product_id: Uuid,
    /// Fields to change.
    pub changes: ProductChanges,
}

impl Command for UpdateProduct {
    fn command_type(&self) -> &'static str {
        "product.update_product"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete a product.
#[derive(Debug, Clone)]
pub struct DeleteProduct {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The product identifier.
    pub product_id: Uuid,
}

impl Command for DeleteProduct {
    fn command_type(&self) -> &'static str {
        "product.delete_product"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to seed the catalogue in bulk.
#[derive(Debug, Clone)]
pub struct SeedProducts {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Products to create.
    pub products: Vec<ProductDetails>,
}

impl Command for SeedProducts {
    fn command_type(&self) -> &'static str {
        "product.seed_products"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
