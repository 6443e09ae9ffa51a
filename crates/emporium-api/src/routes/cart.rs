//! Routes for the cart service. Every route acts on the caller's own cart.

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use emporium_cart::application::query_handlers::CartView;
use emporium_cart::application::{command_handlers, query_handlers};
use emporium_cart::domain::commands;
use emporium_cart::domain::model::Cart;

use crate::error::ApiError;
use crate::extract::CallerId;
use crate::state::AppState;

/// Request body for POST /items.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

/// Request body for PATCH /items/{product_id}.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

/// GET /
async fn get_cart(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<CartView>, ApiError> {
    let cart = query_handlers::get_cart(user_id, state.store.as_ref()).await?;
    Ok(Json(cart))
}

/// POST /items
#[instrument(skip(state, request), fields(product_id = %request.product_id))]
async fn add_item(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let command = commands::AddCartItem {
        correlation_id: Uuid::new_v4(),
        user_id,
        product_id: request.product_id,
        quantity: request.quantity,
    };

    info!(correlation_id = %command.correlation_id, "handling add_cart_item command");

    let cart = command_handlers::handle_add_cart_item(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(cart))
}

/// PATCH /items/{product_id}
#[instrument(skip(state, request))]
async fn set_quantity(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(product_id): Path<Uuid>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<Cart>, ApiError> {
    let command = commands::SetCartItemQuantity {
        correlation_id: Uuid::new_v4(),
        user_id,
        product_id,
        quantity: request.quantity,
    };

    info!(correlation_id = %command.correlation_id, "handling set_cart_item_quantity command");

    let cart = command_handlers::handle_set_cart_item_quantity(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(cart))
}

/// DELETE /items/{product_id}
#[instrument(skip(state))]
async fn remove_item(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let command = commands::RemoveCartItem {
        correlation_id: Uuid::new_v4(),
        user_id,
        product_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_cart_item command");

    let cart = command_handlers::handle_remove_cart_item(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(cart))
}

/// DELETE /
#[instrument(skip(state))]
async fn clear_cart(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<Cart>, ApiError> {
    let command = commands::ClearCart {
        correlation_id: Uuid::new_v4(),
        user_id,
    };

    info!(correlation_id = %command.correlation_id, "handling clear_cart command");

    let cart = command_handlers::handle_clear_cart(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(cart))
}

/// Returns the router for the cart service.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/{product_id}", patch(set_quantity).delete(remove_item))
}
