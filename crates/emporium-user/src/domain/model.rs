//! User documents.

use chrono::{DateTime, Utc};
use emporium_core::document::Document;
use emporium_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A shopper.
    #[default]
    User,
    /// A store administrator.
    Admin,
}

/// The authoritative user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Hash produced by the external authentication layer.
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The public projection of this account.
    #[must_use]
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            phone: self.phone.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// What other services and HTTP callers see of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

impl Document for UserSnapshot {
    const COLLECTION: &'static str = User::COLLECTION;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Checks the name and email of an account.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty name or an email without
/// an `@`.
pub fn validate_identity(name: &str, email: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation("name must not be empty".into()));
    }
    if !email.contains('@') {
        return Err(DomainError::Validation(format!(
            "email {email:?} is not valid"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identity() {
        assert!(validate_identity("Ada", "ada@example.com").is_ok());
        assert!(validate_identity(" ", "ada@example.com").is_err());
        assert!(validate_identity("Ada", "ada.example.com").is_err());
    }

    #[test]
    fn test_snapshot_omits_password_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Admin,
            phone: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(user.snapshot()).unwrap();

        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "admin");
        assert_eq!(json["email"], "ada@example.com");
    }
}
