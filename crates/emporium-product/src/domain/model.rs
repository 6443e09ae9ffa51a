//! Product documents.

use chrono::{DateTime, Utc};
use emporium_core::document::Document;
use emporium_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Price after applying a whole-number percentage discount, rounded down.
#[must_use]
pub fn discounted_price(price: i64, discount: i64) -> i64 {
    price * (100 - discount) / 100
}

/// The editable fields of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    /// Display title.
    pub title: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Category name.
    #[serde(default)]
    pub category: String,
    /// List price in minor currency units.
    pub price: i64,
    /// Discount percentage, 0 to 100.
    #[serde(default)]
    pub discount: i64,
    /// Units in stock.
    pub stock: i64,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Brand name.
    #[serde(default)]
    pub brand: Option<String>,
    /// Stock keeping unit.
    #[serde(default)]
    pub sku: Option<String>,
    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductDetails {
    /// Checks field constraints.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("title must not be empty".into()));
        }
        if self.price < 0 {
            return Err(DomainError::Validation("price must not be negative".into()));
        }
        if !(0..=100).contains(&self.discount) {
            return Err(DomainError::Validation(
                "discount must be between 0 and 100".into(),
            ));
        }
        if self.stock < 0 {
            return Err(DomainError::Validation("stock must not be negative".into()));
        }
        Ok(())
    }
}

/// Partial update of a product. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub discount: Option<i64>,
    pub stock: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub images: Option<Vec<String>>,
}

/// The authoritative product, also its published snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product identifier, reused by every replica.
    pub id: Uuid,
    /// Editable fields.
    #[serde(flatten)]
    pub details: ProductDetails,
    /// `price` with `discount` applied.
    pub discounted_price: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product from validated details.
    #[must_use]
    pub fn new(id: Uuid, details: ProductDetails, now: DateTime<Utc>) -> Self {
        let discounted_price = discounted_price(details.price, details.discount);
        Self {
            id,
            details,
            discounted_price,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies `changes`, revalidates, and recomputes the discounted price.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the result is invalid; `self` is
    /// left unchanged in that case.
    pub fn apply(
        &mut self,
        changes: ProductChanges,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut details = self.details.clone();
        if let Some(title) = changes.title {
            details.title = title;
        }
        if let Some(description) = changes.description {
            details.description = description;
        }
        if let Some(category) = changes.category {
            details.category = category;
        }
        if let Some(price) = changes.price {
            details.price = price;
        }
        if let Some(discount) = changes.discount {
            details.discount = discount;
        }
        if let Some(stock) = changes.stock {
            details.stock = stock;
        }
        if let Some(tags) = changes.tags {
            details.tags = tags;
        }
        if changes.brand.is_some() {
            details.brand = changes.brand;
        }
        if changes.sku.is_some() {
            details.sku = changes.sku;
        }
        if let Some(images) = changes.images {
            details.images = images;
        }
        details.validate()?;

        self.discounted_price = discounted_price(details.price, details.discount);
        self.details = details;
        self.updated_at = now;
        Ok(())
    }
}

impl Document for Product {
    const COLLECTION: &'static str = "products";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Stock level carried back by the order saga. Projected onto the
/// authoritative product without touching any other field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    /// Product identifier.
    pub id: Uuid,
    /// Units in stock after the saga's reservation or release.
    pub stock: i64,
}

impl Document for StockLevel {
    const COLLECTION: &'static str = Product::COLLECTION;

    fn id(&self) -> Uuid {
        self.id
    }
}
