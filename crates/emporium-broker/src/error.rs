//! Broker error types.

use thiserror::Error;

/// Errors raised by broker transports and the broker client.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The transport could not be created or reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A message could not be appended to its topic.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A consumer group could not be established.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// A transport call did not complete within its time bound.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The bound that was exceeded.
        millis: u128,
    },

    /// An envelope could not be encoded.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl BrokerError {
    /// Returns `true` for errors worth retrying with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Publish(_) | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_errors_are_not_retried() {
        assert!(!BrokerError::Encoding("bad".into()).is_transient());
        assert!(!BrokerError::Subscribe("no group".into()).is_transient());
        assert!(BrokerError::Publish("leader unavailable".into()).is_transient());
        assert!(
            BrokerError::Timeout {
                operation: "publish",
                millis: 5000
            }
            .is_transient()
        );
    }
}
