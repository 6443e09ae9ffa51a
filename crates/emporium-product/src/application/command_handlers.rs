//! Command handlers for the Product context.
//!
//! Each handler validates, writes the authoritative document, and then
//! publishes the matching envelope on `Product-Topic`. Publication is best
//! effort: a broker failure is logged and never fails the write.

use emporium_broker::BrokerClient;
use emporium_core::clock::Clock;
use emporium_core::command::Command;
use emporium_core::document::{Collection, DocumentStore};
use emporium_core::envelope::{Envelope, Topic};
use emporium_core::error::DomainError;
use tracing::info;
use uuid::Uuid;

use crate::domain::commands::{CreateProduct, DeleteProduct, SeedProducts, UpdateProduct};
use crate::domain::model::Product;

fn not_found(id: Uuid) -> DomainError {
    DomainError::NotFound {
        entity: "product",
        id,
    }
}

/// Handles the `CreateProduct` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid fields and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_create_product(
    command: &CreateProduct,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Product, DomainError> {
    command.details.validate()?;
    let product = Product::new(Uuid::new_v4(), command.details.clone(), clock.now());

    Collection::<Product>::new(store).replace(&product).await?;
    info!(
        command = command.command_type(),
        product_id = %product.id,
        "product created"
    );

    broker
        .publish_or_log(
            Topic::Product,
            &Envelope::Create(product.clone()),
            command.correlation_id,
        )
        .await;
    Ok(product)
}

/// Handles the `UpdateProduct` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the product does not exist,
/// `DomainError::Validation` if the result is invalid, and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_update_product(
    command: &UpdateProduct,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Product, DomainError> {
    let products = Collection::<Product>::new(store);
    let mut product = products
        .find(command.product_id)
        .await?
        .ok_or_else(|| not_found(command.product_id))?;

    product.apply(command.changes.clone(), clock.now())?;
    products.replace(&product).await?;
    info!(
        command = command.command_type(),
        product_id = %product.id,
        "product updated"
    );

    broker
        .publish_or_log(
            Topic::Product,
            &Envelope::Update(product.clone()),
            command.correlation_id,
        )
        .await;
    Ok(product)
}

/// Handles the `DeleteProduct` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the product does not exist and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_delete_product(
    command: &DeleteProduct,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<(), DomainError> {
    if !Collection::<Product>::new(store)
        .delete(command.product_id)
        .await?
    {
        return Err(not_found(command.product_id));
    }
    info!(
        command = command.command_type(),
        product_id = %command.product_id,
        "product deleted"
    );

    broker
        .publish_or_log(
            Topic::Product,
            &Envelope::<Product>::Delete(command.product_id),
            command.correlation_id,
        )
        .await;
    Ok(())
}

/// Handles the `SeedProducts` command: creates every product and publishes a
/// single `INSERT` carrying all of them.
///
/// # Errors
///
/// Returns `DomainError::Validation` if any product is invalid (nothing is
/// written in that case) and `DomainError::Infrastructure` on storage failure.
pub async fn handle_seed_products(
    command: &SeedProducts,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<Vec<Product>, DomainError> {
    for details in &command.products {
        details.validate()?;
    }

    let now = clock.now();
    let products: Vec<Product> = command
        .products
        .iter()
        .map(|details| Product::new(Uuid::new_v4(), details.clone(), now))
        .collect();

    let collection = Collection::<Product>::new(store);
    for product in &products {
        collection.insert_if_absent(product).await?;
    }
    info!(
        command = command.command_type(),
        count = products.len(),
        "products seeded"
    );

    broker
        .publish_or_log(
            Topic::Product,
            &Envelope::Insert(products.clone()),
            command.correlation_id,
        )
        .await;
    Ok(products)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use emporium_broker::InMemoryBroker;
    use emporium_core::envelope::EventKind;
    use emporium_store::MemoryDocumentStore;
    use emporium_test_support::{
        FailingBroker, FailingDocumentStore, FixedClock, RecordingDeadLetterSink, broker_client,
        in_memory_client,
    };

    use super::*;
    use crate::domain::model::{ProductChanges, ProductDetails};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn details(title: &str, price: i64, stock: i64) -> ProductDetails {
        ProductDetails {
            title: title.into(),
            description: String::new(),
            category: "home".into(),
            price,
            discount: 0,
            stock,
            tags: vec![],
            brand: None,
            sku: None,
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_handle_create_product_stores_and_publishes_create() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "product-service");
        let correlation_id = Uuid::new_v4();
        let command = CreateProduct {
            correlation_id,
            details: details("Desk lamp", 100_000, 5),
        };

        // Act
        let product = handle_create_product(&command, &clock(), &store, &client)
            .await
            .unwrap();

        // Assert
        assert_eq!(product.discounted_price, 100_000);
        assert_eq!(product.created_at, clock().0);
        assert_eq!(store.count("products").await, 1);

        let published = broker.envelopes("Product-Topic").await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].kind, EventKind::Create);
        assert_eq!(published[0].correlation_id, correlation_id);
        assert_eq!(published[0].payload["id"], product.id.to_string());
    }

    #[tokio::test]
    async fn test_handle_create_product_rejects_invalid_without_publishing() {
        let store = MemoryDocumentStore::new();
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "product-service");
        let command = CreateProduct {
            correlation_id: Uuid::new_v4(),
            details: details("Desk lamp", -5, 5),
        };

        let result = handle_create_product(&command, &clock(), &store, &client).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.count("products").await, 0);
        assert!(broker.envelopes("Product-Topic").await.is_empty());
    }

    #[tokio::test]
    async fn test_handle_create_product_survives_broker_outage() {
        let store = MemoryDocumentStore::new();
        let client = broker_client(
            Arc::new(FailingBroker),
            "product-service",
            Arc::new(RecordingDeadLetterSink::new()),
        );
        let command = CreateProduct {
            correlation_id: Uuid::new_v4(),
            details: details("Desk lamp", 100, 1),
        };

        let result = handle_create_product(&command, &clock(), &store, &client).await;

        assert!(result.is_ok());
        assert_eq!(store.count("products").await, 1);
    }

    #[tokio::test]
    async fn test_handle_update_product_publishes_update_with_new_price() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "product-service");
        let created = handle_create_product(
            &CreateProduct {
                correlation_id: Uuid::new_v4(),
                details: details("Desk lamp", 1_000, 5),
            },
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();
        let command = UpdateProduct {
            correlation_id: Uuid::new_v4(),
            product_id: created.id,
            changes: ProductChanges {
                discount: Some(50),
                ..ProductChanges::default()
            },
        };

        // Act
        let updated = handle_update_product(&command, &clock(), &store, &client)
            .await
            .unwrap();

        // Assert
        assert_eq!(updated.discounted_price, 500);
        let published = broker.envelopes("Product-Topic").await;
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].kind, EventKind::Update);
        assert_eq!(published[1].payload["discountedPrice"], 500);
    }

    #[tokio::test]
    async fn test_handle_update_product_returns_not_found() {
        let store = MemoryDocumentStore::new();
        let client = in_memory_client(&InMemoryBroker::new(), "product-service");
        let product_id = Uuid::new_v4();
        let command = UpdateProduct {
            correlation_id: Uuid::new_v4(),
            product_id,
            changes: ProductChanges::default(),
        };

        let result = handle_update_product(&command, &clock(), &store, &client).await;

        match result.unwrap_err() {
            DomainError::NotFound { entity, id } => {
                assert_eq!(entity, "product");
                assert_eq!(id, product_id);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_delete_product_publishes_identifier_only() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "product-service");
        let created = handle_create_product(
            &CreateProduct {
                correlation_id: Uuid::new_v4(),
                details: details("Desk lamp", 1_000, 5),
            },
            &clock(),
            &store,
            &client,
        )
        .await
        .unwrap();

        // Act
        handle_delete_product(
            &DeleteProduct {
                correlation_id: Uuid::new_v4(),
                product_id: created.id,
            },
            &store,
            &client,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(store.count("products").await, 0);
        let published = broker.envelopes("Product-Topic").await;
        assert_eq!(published[1].kind, EventKind::Delete);
        assert_eq!(
            published[1].payload,
            serde_json::json!({ "id": created.id })
        );
    }

    #[tokio::test]
    async fn test_handle_seed_products_publishes_single_insert() {
        let store = MemoryDocumentStore::new();
        let broker = InMemoryBroker::new();
        let client = in_memory_client(&broker, "product-service");
        let command = SeedProducts {
            correlation_id: Uuid::new_v4(),
            products: vec![details("Lamp", 10, 1), details("Chair", 20, 2)],
        };

        let seeded = handle_seed_products(&command, &clock(), &store, &client)
            .await
            .unwrap();

        assert_eq!(seeded.len(), 2);
        assert_eq!(store.count("products").await, 2);
        let published = broker.envelopes("Product-Topic").await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].kind, EventKind::Insert);
        assert_eq!(published[0].payload.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_handle_seed_products_writes_nothing_when_one_is_invalid() {
        let store = MemoryDocumentStore::new();
        let client = in_memory_client(&InMemoryBroker::new(), "product-service");
        let command = SeedProducts {
            correlation_id: Uuid::new_v4(),
            products: vec![details("Lamp", 10, 1), details("", 20, 2)],
        };

        let result = handle_seed_products(&command, &clock(), &store, &client).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.count("products").await, 0);
    }

    #[tokio::test]
    async fn test_handle_create_product_propagates_storage_failure() {
        let client = in_memory_client(&InMemoryBroker::new(), "product-service");
        let command = CreateProduct {
            correlation_id: Uuid::new_v4(),
            details: details("Desk lamp", 100, 1),
        };

        let result =
            handle_create_product(&command, &clock(), &FailingDocumentStore, &client).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
