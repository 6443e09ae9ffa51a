//! Broker client configuration.

use std::time::Duration;

/// Settings for connecting a service to the shared log.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Comma-separated bootstrap servers; `None` selects the in-memory log.
    pub bootstrap_servers: Option<String>,
    /// Per-service client identifier, also the consumer-group prefix.
    pub client_id: String,
    /// Bound on a single publish attempt.
    pub publish_timeout: Duration,
    /// Bound on a single handler invocation.
    pub handler_timeout: Duration,
    /// Publish attempts before giving up (first attempt included).
    pub max_publish_attempts: usize,
    /// Deliveries of one message before it is dead-lettered.
    pub max_delivery_attempts: u32,
}

impl BrokerConfig {
    /// Default configuration for the given client identifier.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: None,
            client_id: client_id.into(),
            publish_timeout: Duration::from_secs(5),
            handler_timeout: Duration::from_secs(30),
            max_publish_attempts: 3,
            max_delivery_attempts: 5,
        }
    }

    /// Sets the bootstrap servers.
    #[must_use]
    pub fn with_bootstrap_servers(mut self, servers: impl Into<String>) -> Self {
        self.bootstrap_servers = Some(servers.into());
        self
    }

    /// Sets the publish timeout.
    #[must_use]
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Sets the handler timeout.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }
}
