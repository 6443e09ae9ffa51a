//! Broker test doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use emporium_broker::{
    Broker, BrokerClient, BrokerConfig, BrokerError, ConsumerHandle, DeadLetterSink,
    InMemoryBroker, Subscription, TracingDeadLetterSink,
};

/// A broker that refuses every publish and subscription. Useful for checking
/// that handlers treat publication as best effort.
#[derive(Debug)]
pub struct FailingBroker;

#[async_trait]
impl Broker for FailingBroker {
    async fn publish(
        &self,
        _topic: &str,
        _key: &str,
        _payload: Vec<u8>,
    ) -> Result<(), BrokerError> {
        Err(BrokerError::Publish("broker unavailable".into()))
    }

    async fn subscribe(
        &self,
        _subscription: Subscription,
    ) -> Result<ConsumerHandle, BrokerError> {
        Err(BrokerError::Subscribe("broker unavailable".into()))
    }
}

/// A client for `client_id` over `broker` with short timeouts.
#[must_use]
pub fn broker_client(
    broker: Arc<dyn Broker>,
    client_id: &str,
    dead_letters: Arc<dyn DeadLetterSink>,
) -> BrokerClient {
    let config = BrokerConfig::new(client_id)
        .with_publish_timeout(Duration::from_millis(500))
        .with_handler_timeout(Duration::from_secs(2));
    BrokerClient::new(broker, config, dead_letters)
}

/// A client for `client_id` over `broker`, logging dead letters.
#[must_use]
pub fn in_memory_client(broker: &InMemoryBroker, client_id: &str) -> BrokerClient {
    broker_client(
        Arc::new(broker.clone()),
        client_id,
        Arc::new(TracingDeadLetterSink),
    )
}
