//! Routes for the user service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use emporium_user::application::{command_handlers, query_handlers};
use emporium_user::domain::commands;
use emporium_user::domain::model::{Role, UserSnapshot};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    /// Hash produced by the authentication layer.
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

/// Request body for PATCH /{id}.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
}

/// POST /
#[instrument(skip(state, request))]
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSnapshot>), ApiError> {
    let command = commands::CreateUser {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        email: request.email,
        password_hash: request.password_hash,
        role: request.role,
        phone: request.phone,
        avatar: request.avatar,
    };

    info!(correlation_id = %command.correlation_id, "handling create_user command");

    let user = command_handlers::handle_create_user(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH /{id}
#[instrument(skip(state, request))]
async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserSnapshot>, ApiError> {
    let command = commands::UpdateUser {
        correlation_id: Uuid::new_v4(),
        user_id,
        name: request.name,
        email: request.email,
        role: request.role,
        phone: request.phone,
        avatar: request.avatar,
    };

    info!(correlation_id = %command.correlation_id, "handling update_user command");

    let user = command_handlers::handle_update_user(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
        &state.broker,
    )
    .await?;

    Ok(Json(user))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let command = commands::DeleteUser {
        correlation_id: Uuid::new_v4(),
        user_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_user command");

    command_handlers::handle_delete_user(&command, state.store.as_ref(), &state.broker).await?;

    Ok(Json(DeletedResponse { id: user_id }))
}

/// GET /{id}
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserSnapshot>, ApiError> {
    let user = query_handlers::get_user(user_id, state.store.as_ref()).await?;
    Ok(Json(user))
}

/// Returns the router for the user service.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create_user)).route(
        "/{id}",
        get(get_user).patch(update_user).delete(delete_user),
    )
}
