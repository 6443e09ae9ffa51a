//! Query handlers for the Product context.

use emporium_core::document::{Collection, DocumentStore};
use emporium_core::error::DomainError;
use uuid::Uuid;

use crate::domain::model::Product;

/// Retrieves a product by ID.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the product does not exist and
/// `DomainError::Infrastructure` on storage failure.
pub async fn get_product(
    product_id: Uuid,
    store: &dyn DocumentStore,
) -> Result<Product, DomainError> {
    Collection::<Product>::new(store)
        .find(product_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "product",
            id: product_id,
        })
}

/// Lists every product, newest first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` on storage failure.
pub async fn list_products(store: &dyn DocumentStore) -> Result<Vec<Product>, DomainError> {
    let mut products = Collection::<Product>::new(store).find_all().await?;
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    Ok(products)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use emporium_store::MemoryDocumentStore;

    use super::*;
    use crate::domain::model::ProductDetails;

    fn product(title: &str, hours: i64) -> Product {
        let created = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap() + Duration::hours(hours);
        Product::new(
            Uuid::new_v4(),
            ProductDetails {
                title: title.into(),
                description: String::new(),
                category: String::new(),
                price: 10,
                discount: 0,
                stock: 1,
                tags: vec![],
                brand: None,
                sku: None,
                images: vec![],
            },
            created,
        )
    }

    #[tokio::test]
    async fn test_get_product_returns_not_found_for_unknown_id() {
        let store = MemoryDocumentStore::new();

        let result = get_product(Uuid::new_v4(), &store).await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "product",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_list_products_orders_newest_first() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let products = Collection::<Product>::new(&store);
        products.replace(&product("old", 0)).await.unwrap();
        products.replace(&product("new", 5)).await.unwrap();

        // Act
        let listed = list_products(&store).await.unwrap();

        // Assert
        let titles: Vec<_> = listed.iter().map(|p| p.details.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "old"]);
    }
}
