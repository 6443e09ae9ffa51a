//! Query handlers for the User context.

use emporium_core::document::{Collection, DocumentStore};
use emporium_core::error::DomainError;
use uuid::Uuid;

use crate::domain::model::{User, UserSnapshot};

/// Retrieves a user's public profile.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user does not exist and
/// `DomainError::Infrastructure` on storage failure.
pub async fn get_user(
    user_id: Uuid,
    store: &dyn DocumentStore,
) -> Result<UserSnapshot, DomainError> {
    Collection::<User>::new(store)
        .find(user_id)
        .await?
        .as_ref()
        .map(User::snapshot)
        .ok_or(DomainError::NotFound {
            entity: "user",
            id: user_id,
        })
}
