//! Commands for the User context.

use emporium_core::command::Command;
use uuid::Uuid;

use super::model::Role;

/// Command to register a user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

impl Command for CreateUser {
    fn command_type(&self) -> &'static str {
        "user.create_user"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to change profile fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user identifier.
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

impl Command for UpdateUser {
    fn command_type(&self) -> &'static str {
        "user.update_user"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete a user.
#[derive(Debug, Clone)]
pub struct DeleteUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user identifier.
    pub user_id: Uuid,
}

impl Command for DeleteUser {
    fn command_type(&self) -> &'static str {
        "user.delete_user"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
