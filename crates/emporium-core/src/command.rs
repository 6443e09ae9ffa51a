//! Command abstractions.

use uuid::Uuid;

/// Trait that all write-path commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID used to trace this command through published envelopes.
    fn correlation_id(&self) -> Uuid;
}
