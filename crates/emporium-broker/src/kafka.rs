//! Kafka transport.
//!
//! Records are keyed by envelope kind. Consumers use consumer groups with
//! auto-commit disabled and commit each message only after delivery.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message as KafkaMessage;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, ConsumerHandle, Subscription};
use crate::config::BrokerConfig;
use crate::consumer::deliver;
use crate::error::BrokerError;

/// Kafka-backed broker.
pub struct KafkaBroker {
    producer: FutureProducer,
    bootstrap_servers: String,
    client_id: String,
    publish_timeout: Duration,
}

impl KafkaBroker {
    /// Creates the producer. Brokers are contacted lazily, so an unreachable
    /// cluster surfaces on first publish rather than here.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connection` if no bootstrap servers are
    /// configured or the producer cannot be created.
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let bootstrap_servers = config
            .bootstrap_servers
            .clone()
            .ok_or_else(|| BrokerError::Connection("no bootstrap servers configured".into()))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap_servers)
            .set("client.id", &config.client_id)
            .set(
                "message.timeout.ms",
                config.publish_timeout.as_millis().to_string(),
            )
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| BrokerError::Connection(format!("failed to create producer: {e}")))?;

        info!(
            servers = %bootstrap_servers,
            client_id = %config.client_id,
            "kafka producer created"
        );

        Ok(Self {
            producer,
            bootstrap_servers,
            client_id: config.client_id.clone(),
            publish_timeout: config.publish_timeout,
        })
    }

    fn consumer_config(&self, group_id: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("client.id", &self.client_id)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest");
        config
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let record = FutureRecord::to(topic).key(key).payload(&payload);

        self.producer
            .send(record, self.publish_timeout)
            .await
            .map_err(|(e, _)| BrokerError::Publish(format!("failed to publish to {topic}: {e}")))?;

        debug!(topic = %topic, key = %key, "record published");
        Ok(())
    }

    async fn subscribe(&self, subscription: Subscription) -> Result<ConsumerHandle, BrokerError> {
        let consumer: StreamConsumer = self
            .consumer_config(&subscription.group_id)
            .create()
            .map_err(|e| BrokerError::Connection(format!("failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[subscription.topic.as_str()])
            .map_err(|e| BrokerError::Subscribe(format!("{}: {e}", subscription.topic)))?;

        info!(
            topic = %subscription.topic,
            group_id = %subscription.group_id,
            "consumer started"
        );

        let topic = subscription.topic.clone();
        let group_id = subscription.group_id.clone();
        let task = tokio::spawn(async move {
            let mut stream = consumer.stream();
            while let Some(next) = stream.next().await {
                let message = match next {
                    Ok(message) => message,
                    Err(e) => {
                        error!(topic = %subscription.topic, error = %e, "error receiving message");
                        continue;
                    }
                };

                let key = message.key().map(String::from_utf8_lossy);
                match message.payload() {
                    Some(body) => deliver(&subscription, key.as_deref(), body).await,
                    None => warn!(topic = %subscription.topic, "message with no payload"),
                }

                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                    error!(topic = %subscription.topic, error = %e, "failed to commit offset");
                }
            }
        });

        Ok(ConsumerHandle::new(topic, group_id, task))
    }
}
