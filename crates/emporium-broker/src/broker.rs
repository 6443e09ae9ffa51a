//! Transport abstraction and subscription types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use emporium_core::envelope::RawEnvelope;
use tokio::task::JoinHandle;

use crate::dead_letter::DeadLetterSink;
use crate::error::BrokerError;

/// Receives decoded envelopes for one consumer group.
///
/// The offset is committed once `handle` returns, so implementations must
/// deal with their own failures before returning.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    /// Applies one envelope.
    async fn handle(&self, envelope: RawEnvelope);
}

/// Everything a transport needs to run one consumer group.
pub struct Subscription {
    /// Topic name.
    pub topic: String,
    /// Consumer group identifier.
    pub group_id: String,
    /// Handler invoked once per message.
    pub handler: Arc<dyn EnvelopeHandler>,
    /// Bound on a single handler invocation.
    pub handler_timeout: Duration,
    /// Deliveries before a message is dead-lettered.
    pub max_delivery_attempts: u32,
    /// Destination for undeliverable messages.
    pub dead_letters: Arc<dyn DeadLetterSink>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("group_id", &self.group_id)
            .field("handler_timeout", &self.handler_timeout)
            .field("max_delivery_attempts", &self.max_delivery_attempts)
            .finish_non_exhaustive()
    }
}

/// A running consumer. Dropping the handle leaves the consumer running.
#[derive(Debug)]
pub struct ConsumerHandle {
    topic: String,
    group_id: String,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub(crate) fn new(topic: String, group_id: String, task: JoinHandle<()>) -> Self {
        Self {
            topic,
            group_id,
            task,
        }
    }

    /// Topic this consumer reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group this consumer belongs to.
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Stops the consumer. Uncommitted messages are redelivered to the next
    /// consumer of the same group.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Returns `true` once the consumer task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// A durable, ordered, topic-partitioned log.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Appends one record to `topic`.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Starts a consumer group reading `subscription.topic` from its last
    /// committed offset.
    async fn subscribe(&self, subscription: Subscription) -> Result<ConsumerHandle, BrokerError>;
}
