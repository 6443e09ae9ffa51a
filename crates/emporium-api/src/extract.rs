//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use emporium_core::error::DomainError;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated caller, set by the auth layer in front
/// of the services.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller's user ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| DomainError::Validation(format!("missing {USER_ID_HEADER} header")))?;
        value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(CallerId)
            .ok_or_else(|| {
                ApiError(DomainError::Validation(format!(
                    "{USER_ID_HEADER} header is not a UUID"
                )))
            })
    }
}
