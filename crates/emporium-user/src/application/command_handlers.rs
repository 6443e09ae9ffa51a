//! Command handlers for the User context.

use emporium_broker::BrokerClient;
use emporium_core::clock::Clock;
use emporium_core::command::Command;
use emporium_core::document::{Collection, DocumentStore};
use emporium_core::envelope::{Envelope, Topic};
use emporium_core::error::DomainError;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::commands::{CreateUser, DeleteUser, UpdateUser};
use crate::domain::model::{User, UserSnapshot, validate_identity};

fn not_found(id: Uuid) -> DomainError {
    DomainError::NotFound { entity: "user", id }
}

async fn ensure_email_free(
    users: &Collection<'_, User>,
    email: &str,
    owner: Option<Uuid>,
) -> Result<(), DomainError> {
    match users.find_one_by("email", &Value::from(email)).await? {
        Some(existing) if Some(existing.id) != owner => Err(DomainError::Validation(format!(
            "email {email} is already registered"
        ))),
        _ => Ok(()),
    }
}

/// Handles the `CreateUser` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an invalid or already registered
/// identity and `DomainError::Infrastructure` on storage failure.
pub async fn handle_create_user(
    command: &CreateUser,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<UserSnapshot, DomainError> {
    validate_identity(&command.name, &command.email)?;
    let users = Collection::<User>::new(store);
    ensure_email_free(&users, &command.email, None).await?;

    let now = clock.now();
    let user = User {
        id: Uuid::new_v4(),
        name: command.name.clone(),
        email: command.email.clone(),
        password_hash: command.password_hash.clone(),
        role: command.role,
        phone: command.phone.clone(),
        avatar: command.avatar.clone(),
        created_at: now,
        updated_at: now,
    };
    users.replace(&user).await?;
    info!(command = command.command_type(), user_id = %user.id, "user created");

    let snapshot = user.snapshot();
    broker
        .publish_or_log(
            Topic::User,
            &Envelope::Create(snapshot.clone()),
            command.correlation_id,
        )
        .await;
    Ok(snapshot)
}

/// Handles the `UpdateUser` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user does not exist,
/// `DomainError::Validation` for an invalid or taken identity, and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_update_user(
    command: &UpdateUser,
    clock: &dyn Clock,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<UserSnapshot, DomainError> {
    let users = Collection::<User>::new(store);
    let mut user = users
        .find(command.user_id)
        .await?
        .ok_or_else(|| not_found(command.user_id))?;

    if let Some(name) = &command.name {
        user.name.clone_from(name);
    }
    if let Some(email) = &command.email {
        user.email.clone_from(email);
    }
    if let Some(role) = command.role {
        user.role = role;
    }
    if command.phone.is_some() {
        user.phone.clone_from(&command.phone);
    }
    if command.avatar.is_some() {
        user.avatar.clone_from(&command.avatar);
    }
    validate_identity(&user.name, &user.email)?;
    ensure_email_free(&users, &user.email, Some(user.id)).await?;
    user.updated_at = clock.now();

    users.replace(&user).await?;
    info!(command = command.command_type(), user_id = %user.id, "user updated");

    let snapshot = user.snapshot();
    broker
        .publish_or_log(
            Topic::User,
            &Envelope::Update(snapshot.clone()),
            command.correlation_id,
        )
        .await;
    Ok(snapshot)
}

/// Handles the `DeleteUser` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user does not exist and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_delete_user(
    command: &DeleteUser,
    store: &dyn DocumentStore,
    broker: &BrokerClient,
) -> Result<(), DomainError> {
    if !Collection::<User>::new(store).delete(command.user_id).await? {
        return Err(not_found(command.user_id));
    }
    info!(command = command.command_type(), user_id = %command.user_id, "user deleted");

    broker
        .publish_or_log(
            Topic::User,
            &Envelope::<UserSnapshot>::Delete(command.user_id),
            command.correlation_id,
        )
        .await;
    Ok(())
}
