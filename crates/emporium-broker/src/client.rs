//! Per-service broker client.
//!
//! One `BrokerClient` is created per service process and shared by its
//! handlers and consumers. Publishing is bounded by a timeout and retried
//! with backoff on transient errors; consumer groups are named
//! `{client_id}-{purpose}`.

use std::sync::Arc;

use backon::Retryable;
use chrono::Utc;
use emporium_core::document::Document;
use emporium_core::envelope::{Envelope, RawEnvelope, Topic};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::broker::{Broker, ConsumerHandle, EnvelopeHandler, Subscription};
use crate::config::BrokerConfig;
use crate::dead_letter::DeadLetterSink;
use crate::error::BrokerError;
use crate::retry::{publish_backoff, subscribe_backoff};

/// Shared handle to the log for one service.
#[derive(Clone)]
pub struct BrokerClient {
    broker: Arc<dyn Broker>,
    config: BrokerConfig,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

impl BrokerClient {
    /// Creates a client over `broker`.
    #[must_use]
    pub fn new(
        broker: Arc<dyn Broker>,
        config: BrokerConfig,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            broker,
            config,
            dead_letters,
        }
    }

    /// The service's client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// The consumer-group identifier for `purpose`.
    #[must_use]
    pub fn consumer_group(&self, purpose: &str) -> String {
        format!("{}-{purpose}", self.config.client_id)
    }

    /// The sink used for undeliverable messages.
    #[must_use]
    pub fn dead_letters(&self) -> Arc<dyn DeadLetterSink> {
        Arc::clone(&self.dead_letters)
    }

    /// Publishes `envelope` to `topic`, keyed by its kind.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Encoding` if the envelope does not serialize, or
    /// the last transport error once retries are exhausted.
    pub async fn publish<T: Document>(
        &self,
        topic: Topic,
        envelope: &Envelope<T>,
        correlation_id: Uuid,
    ) -> Result<RawEnvelope, BrokerError> {
        let raw = RawEnvelope {
            message_id: Uuid::now_v7(),
            kind: envelope.kind(),
            topic: topic.as_str().to_owned(),
            payload: envelope
                .to_payload()
                .map_err(|e| BrokerError::Encoding(e.to_string()))?,
            correlation_id,
            occurred_at: Utc::now(),
        };
        let body = raw
            .to_bytes()
            .map_err(|e| BrokerError::Encoding(e.to_string()))?;

        let broker = self.broker.as_ref();
        let timeout = self.config.publish_timeout;
        let topic_name = topic.as_str();
        let key = raw.kind.as_str();
        let publish_once = || {
            let body = body.clone();
            async move {
                tokio::time::timeout(timeout, broker.publish(topic_name, key, body))
                    .await
                    .map_err(|_| BrokerError::Timeout {
                        operation: "publish",
                        millis: timeout.as_millis(),
                    })?
            }
        };

        publish_once
            .retry(publish_backoff(self.config.max_publish_attempts))
            .when(BrokerError::is_transient)
            .notify(|err: &BrokerError, delay| {
                warn!(
                    topic = %topic_name,
                    error = %err,
                    delay_ms = delay.as_millis(),
                    "retrying publish"
                );
            })
            .await?;

        info!(
            topic = %topic_name,
            kind = %raw.kind,
            message_id = %raw.message_id,
            correlation_id = %correlation_id,
            "envelope published"
        );
        Ok(raw)
    }

    /// Publishes `envelope`, logging instead of returning failures.
    ///
    /// Returns `true` if the envelope was published.
    pub async fn publish_or_log<T: Document>(
        &self,
        topic: Topic,
        envelope: &Envelope<T>,
        correlation_id: Uuid,
    ) -> bool {
        match self.publish(topic, envelope, correlation_id).await {
            Ok(_) => true,
            Err(err) => {
                error!(
                    topic = %topic,
                    kind = %envelope.kind(),
                    correlation_id = %correlation_id,
                    error = %err,
                    "failed to publish envelope"
                );
                false
            }
        }
    }

    /// Starts the consumer group `{client_id}-{purpose}` on `topic`.
    ///
    /// Setup is retried with backoff; a final failure is logged and `None`
    /// returned so the service keeps running without that consumer.
    pub async fn subscribe(
        &self,
        topic: Topic,
        purpose: &str,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Option<ConsumerHandle> {
        let group_id = self.consumer_group(purpose);
        let subscribe_once = || {
            let subscription = Subscription {
                topic: topic.as_str().to_owned(),
                group_id: group_id.clone(),
                handler: Arc::clone(&handler),
                handler_timeout: self.config.handler_timeout,
                max_delivery_attempts: self.config.max_delivery_attempts,
                dead_letters: Arc::clone(&self.dead_letters),
            };
            let broker = self.broker.as_ref();
            async move { broker.subscribe(subscription).await }
        };

        match subscribe_once
            .retry(subscribe_backoff())
            .when(|err: &BrokerError| !matches!(err, BrokerError::Subscribe(_)))
            .await
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(
                    topic = %topic,
                    group_id = %group_id,
                    error = %err,
                    "failed to start consumer"
                );
                None
            }
        }
    }
}
