//! Shared application state.

use std::sync::Arc;

use emporium_broker::BrokerClient;
use emporium_core::clock::Clock;
use emporium_core::document::DocumentStore;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative documents and replicas of this service.
    pub store: Arc<dyn DocumentStore>,
    /// The process-wide broker client.
    pub broker: BrokerClient,
    /// Clock for timestamps.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        broker: BrokerClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            broker,
            clock,
        }
    }
}
