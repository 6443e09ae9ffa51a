//! Routes for the product service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use emporium_product::application::{command_handlers, query_handlers};
use emporium_product::domain::commands;
use emporium_product::domain::model::{Product, ProductChanges, ProductDetails};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /seed.
#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    pub products: Vec<ProductDetails>,
}

/// Response body for deletions.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
}

/// POST /
#[instrument(skip(state, request), fields(title = %request.title))]
async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<ProductDetails>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let command = commands::CreateProduct {
        correlation_id: Uuid::new_v4(),
        details: request,
    };

    info!(correlation_id = %command.correlation_id, "handling create_product command");

    let product = command_handlers::handle_create_product(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// POST /seed
#[instrument(skip(state, request), fields(count = request.products.len()))]
async fn seed_products(
    State(state): State<AppState>,
    Json(request): Json<SeedRequest>,
) -> Result<(StatusCode, Json<Vec<Product>>), ApiError> {
    let command = commands::SeedProducts {
        correlation_id: Uuid::new_v4(),
        products: request.products,
    };

    info!(correlation_id = %command.correlation_id, "handling seed_products command");

    let products = command_handlers::handle_seed_products(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(products)))
}

/// PATCH /{id}
#[instrument(skip(state, request))]
async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<ProductChanges>,
) -> Result<Json<Product>, ApiError> {
    let command = commands::UpdateProduct {
        correlation_id: Uuid::new_v4(),
        product_id,
        changes: request,
    };

    info!(correlation_id = %command.correlation_id, "handling update_product command");

    let product = command_handlers::handle_update_product(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(product))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let command = commands::DeleteProduct {
        correlation_id: Uuid::new_v4(),
        product_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_product command");

    command_handlers::handle_delete_product(&command, state.store.as_ref(), &state.broker).await?;

    Ok(Json(DeletedResponse { id: product_id }))
}

/// GET /{id}
async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let product = query_handlers::get_product(product_id, state.store.as_ref()).await?;
    Ok(Json(product))
}

/// GET /
async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = query_handlers::list_products(state.store.as_ref()).await?;
    Ok(Json(products))
}

/// Returns the router for the product service.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/seed", post(seed_products))
        .route(
            "/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use emporium_broker::InMemoryBroker;
    use emporium_core::clock::Clock;
    use emporium_core::document::DocumentStore;
    use emporium_store::MemoryDocumentStore;
    use emporium_test_support::{FailingDocumentStore, FixedClock, in_memory_client};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_state_with(store: Arc<dyn DocumentStore>) -> AppState {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        AppState::new(
            store,
            in_memory_client(&InMemoryBroker::new(), "product-service"),
            clock,
        )
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_product_returns_201_with_discounted_price() {
        // Arrange
        let app = router().with_state(app_state_with(Arc::new(MemoryDocumentStore::new())));
        let body = serde_json::json!({
            "title": "Desk lamp",
            "price": 100_000,
            "discount": 10,
            "stock": 5
        });

        // Act
        let response = app.oneshot(json_request("POST", "/", &body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["title"], "Desk lamp");
        assert_eq!(json["discountedPrice"], 90_000);
        Uuid::parse_str(json["id"].as_str().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_create_product_returns_400_for_negative_price() {
        let app = router().with_state(app_state_with(Arc::new(MemoryDocumentStore::new())));
        let body = serde_json::json!({ "title": "Desk lamp", "price": -1, "stock": 5 });

        let response = app.oneshot(json_request("POST", "/", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_get_unknown_product_returns_404() {
        let app = router().with_state(app_state_with(Arc::new(MemoryDocumentStore::new())));

        let request = Request::builder()
            .uri(format!("/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not_found");
    }

    #[tokio::test]
    async fn test_list_products_returns_500_when_store_fails() {
        let app = router().with_state(app_state_with(Arc::new(FailingDocumentStore)));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "infrastructure_error");
    }
}
