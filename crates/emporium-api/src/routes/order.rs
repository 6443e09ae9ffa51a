//! Routes for the order service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use emporium_order::application::query_handlers::OrderView;
use emporium_order::application::{command_handlers, query_handlers, saga};
use emporium_order::domain::commands;
use emporium_order::domain::model::{Order, ShippingAddress};
use emporium_order::domain::status::{OrderStatus, PaymentMethod};

use crate::error::ApiError;
use crate::extract::CallerId;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub street: String,
    pub city: String,
    pub state: String,
    pub detail: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Request body for PATCH /{id}/status.
#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
}

/// POST /
#[instrument(skip(state, request))]
async fn create_order(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let command = commands::CreateOrder {
        correlation_id: Uuid::new_v4(),
        user_id,
        shipping_address: ShippingAddress {
            street: request.street,
            city: request.city,
            state: request.state,
            detail: request.detail,
        },
        payment_method: request.payment_method,
    };

    info!(correlation_id = %command.correlation_id, "handling create_order command");

    let order = saga::create_order(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// PATCH /{id}/cancel
#[instrument(skip(state))]
async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let command = commands::CancelOrder {
        correlation_id: Uuid::new_v4(),
        order_id,
    };

    info!(correlation_id = %command.correlation_id, "handling cancel_order command");

    let order = saga::cancel_order(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(order))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let command = commands::DeleteOrder {
        correlation_id: Uuid::new_v4(),
        order_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_order command");

    saga::delete_order(&command, state.store.as_ref(), &state.broker).await?;

    Ok(Json(DeletedResponse { id: order_id }))
}

/// PATCH /{id}/status
#[instrument(skip(state, request), fields(status = %request.status))]
async fn change_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let command = commands::ChangeOrderStatus {
        correlation_id: Uuid::new_v4(),
        order_id,
        status: request.status,
    };

    info!(correlation_id = %command.correlation_id, "handling change_order_status command");

    let order = command_handlers::handle_change_order_status(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(order))
}

/// PATCH /{id}/pay
#[instrument(skip(state))]
async fn mark_paid(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let command = commands::MarkOrderPaid {
        correlation_id: Uuid::new_v4(),
        order_id,
    };

    info!(correlation_id = %command.correlation_id, "handling mark_order_paid command");

    let order = command_handlers::handle_mark_order_paid(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    Ok(Json(order))
}

/// GET /{id}
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    let order = query_handlers::get_order(order_id, state.store.as_ref()).await?;
    Ok(Json(order))
}

/// GET /
async fn list_orders(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = query_handlers::list_orders_for_user(user_id, state.store.as_ref()).await?;
    Ok(Json(orders))
}

/// Returns the router for the order service.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order).delete(delete_order))
        .route("/{id}/cancel", patch(cancel_order))
        .route("/{id}/status", patch(change_status))
        .route("/{id}/pay", patch(mark_paid))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use emporium_broker::InMemoryBroker;
    use emporium_core::clock::Clock;
    use emporium_core::document::Collection;
    use emporium_order::domain::model::{CartLine, CartReplica, ProductReplica};
    use emporium_store::MemoryDocumentStore;
    use emporium_test_support::{FixedClock, in_memory_client};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::extract::USER_ID_HEADER;

    struct Fixture {
        state: AppState,
        store: Arc<MemoryDocumentStore>,
        user_id: Uuid,
        product_id: Uuid,
    }

    async fn fixture(stock: i64, quantity: i64) -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let user_id = Uuid::new_v4();
        let product = ProductReplica {
            id: Uuid::new_v4(),
            title: "Desk lamp".into(),
            price: 100_000,
            discounted_price: 100_000,
            stock,
        };
        Collection::<ProductReplica>::new(store.as_ref())
            .replace(&product)
            .await
            .unwrap();
        Collection::<CartReplica>::new(store.as_ref())
            .replace(&CartReplica {
                id: Uuid::new_v4(),
                user_id,
                items: vec![CartLine {
                    product_id: product.id,
                    quantity,
                }],
            })
            .await
            .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
        Fixture {
            state: AppState::new(
                store.clone(),
                in_memory_client(&InMemoryBroker::new(), "order-service"),
                clock,
            ),
            store,
            user_id,
            product_id: product.id,
        }
    }

    fn checkout_request(user_id: Uuid) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .header(USER_ID_HEADER, user_id.to_string())
            .body(Body::from(
                serde_json::to_vec(&json!({ "street": "A", "city": "B", "state": "C" })).unwrap(),
            ))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_order_returns_201_with_pending_order() {
        // Arrange
        let fixture = fixture(5, 2).await;

        // Act
        let response = router()
            .with_state(fixture.state.clone())
            .oneshot(checkout_request(fixture.user_id))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["status"], "pending");
        assert_eq!(json["paymentMethod"], "cod");
        assert_eq!(json["totalAmount"], 200_000);
        assert_eq!(json["items"][0]["productId"], fixture.product_id.to_string());
    }

    #[tokio::test]
    async fn test_create_order_with_insufficient_stock_returns_400() {
        let fixture = fixture(1, 2).await;

        let response = router()
            .with_state(fixture.state)
            .oneshot(checkout_request(fixture.user_id))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "insufficient_stock");
    }

    #[tokio::test]
    async fn test_create_order_without_cart_returns_400_cart_empty() {
        let fixture = fixture(1, 1).await;

        let response = router()
            .with_state(fixture.state)
            .oneshot(checkout_request(Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "cart_empty");
    }

    #[tokio::test]
    async fn test_cancel_then_delete_returns_400_cannot_modify() {
        // Arrange
        let fixture = fixture(5, 1).await;
        let created = router()
            .with_state(fixture.state.clone())
            .oneshot(checkout_request(fixture.user_id))
            .await
            .unwrap();
        let order_id = body_json(created).await["id"].as_str().unwrap().to_owned();

        // Act
        let cancelled = router()
            .with_state(fixture.state.clone())
            .oneshot(empty_request("PATCH", &format!("/{order_id}/cancel")))
            .await
            .unwrap();
        let deleted = router()
            .with_state(fixture.state.clone())
            .oneshot(empty_request("DELETE", &format!("/{order_id}")))
            .await
            .unwrap();

        // Assert
        assert_eq!(cancelled.status(), StatusCode::OK);
        assert_eq!(body_json(cancelled).await["status"], "cancelled");
        assert_eq!(deleted.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(deleted).await["error"], "cannot_modify");
        let stock = Collection::<ProductReplica>::new(fixture.store.as_ref())
            .find(fixture.product_id)
            .await
            .unwrap()
            .unwrap()
            .stock;
        assert_eq!(stock, 5);
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_returns_404() {
        let fixture = fixture(5, 1).await;

        let response = router()
            .with_state(fixture.state)
            .oneshot(empty_request("PATCH", &format!("/{}/cancel", Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "order_not_found");
    }

    #[tokio::test]
    async fn test_change_status_rejects_illegal_transition() {
        // Arrange
        let fixture = fixture(5, 1).await;
        let created = router()
            .with_state(fixture.state.clone())
            .oneshot(checkout_request(fixture.user_id))
            .await
            .unwrap();
        let order_id = body_json(created).await["id"].as_str().unwrap().to_owned();
        let request = Request::builder()
            .method("PATCH")
            .uri(format!("/{order_id}/status"))
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "status": "delivered" })).unwrap(),
            ))
            .unwrap();

        // Act
        let response = router()
            .with_state(fixture.state)
            .oneshot(request)
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "cannot_modify");
    }
}
