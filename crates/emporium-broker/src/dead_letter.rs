//! Dead-letter handling for messages that cannot be applied.
//!
//! A message is dead-lettered when its body does not decode, when its handler
//! keeps timing out, or when a projector gives up on a storage failure. The
//! original offset is committed afterwards so the consumer group moves on.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::broker::Broker;

/// A message that could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    /// Topic the message was read from.
    pub topic: String,
    /// Consumer group (or projector) that gave up on it.
    pub consumer: String,
    /// Message key, if any.
    pub key: Option<String>,
    /// Message body, lossily decoded as UTF-8.
    pub payload: String,
    /// Why the message was rejected.
    pub reason: String,
    /// Delivery attempts made.
    pub attempts: u32,
    /// When the message was rejected.
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Builds a dead letter from a raw message body.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        consumer: impl Into<String>,
        key: Option<&str>,
        payload: &[u8],
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            topic: topic.into(),
            consumer: consumer.into(),
            key: key.map(str::to_owned),
            payload: String::from_utf8_lossy(payload).into_owned(),
            reason: reason.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }

    /// Name of the dead-letter topic for this message.
    #[must_use]
    pub fn dead_letter_topic(&self) -> String {
        format!("{}-DLQ", self.topic)
    }
}

/// Destination for dead letters.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Records a dead letter. Never fails; sinks log their own errors.
    async fn send(&self, letter: DeadLetter);
}

/// Logs dead letters at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for TracingDeadLetterSink {
    async fn send(&self, letter: DeadLetter) {
        error!(
            topic = %letter.topic,
            consumer = %letter.consumer,
            key = ?letter.key,
            reason = %letter.reason,
            attempts = letter.attempts,
            payload = %letter.payload,
            "message dead-lettered"
        );
    }
}

/// Publishes dead letters to `{topic}-DLQ` on the broker.
pub struct BrokerDeadLetterSink {
    broker: Arc<dyn Broker>,
}

impl BrokerDeadLetterSink {
    /// Creates a sink publishing through `broker`.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl DeadLetterSink for BrokerDeadLetterSink {
    async fn send(&self, letter: DeadLetter) {
        let topic = letter.dead_letter_topic();
        let body = match serde_json::to_vec(&letter) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, topic = %topic, "failed to encode dead letter");
                TracingDeadLetterSink.send(letter).await;
                return;
            }
        };

        match self.broker.publish(&topic, "DEAD_LETTER", body).await {
            Ok(()) => info!(
                topic = %topic,
                consumer = %letter.consumer,
                reason = %letter.reason,
                "message dead-lettered"
            ),
            Err(err) => {
                error!(error = %err, topic = %topic, "failed to publish dead letter");
                TracingDeadLetterSink.send(letter).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;

    #[test]
    fn test_dead_letter_topic_appends_suffix() {
        let letter = DeadLetter::new(
            "Product-Topic",
            "cart-service-product-replica",
            None,
            b"{}",
            "bad",
            1,
        );

        assert_eq!(letter.dead_letter_topic(), "Product-Topic-DLQ");
    }

    #[tokio::test]
    async fn test_broker_sink_publishes_to_dead_letter_topic() {
        // Arrange
        let broker = Arc::new(InMemoryBroker::new());
        let sink = BrokerDeadLetterSink::new(broker.clone());
        let letter = DeadLetter::new(
            "User-Topic",
            "order-service-user-replica",
            Some("CREATE"),
            b"garbage",
            "malformed payload",
            1,
        );

        // Act
        sink.send(letter).await;

        // Assert
        let bodies = broker.payloads("User-Topic-DLQ").await;
        assert_eq!(bodies.len(), 1);
        let stored: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
        assert_eq!(stored["payload"], "garbage");
        assert_eq!(stored["reason"], "malformed payload");
    }
}
