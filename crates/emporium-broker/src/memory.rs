//! In-process broker.
//!
//! Each topic is an append-only vector of records. Consumer groups keep a
//! committed offset per topic, advanced only after a record has been
//! delivered, so a consumer restarted under the same group resumes at the
//! first uncommitted record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use emporium_core::envelope::RawEnvelope;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::broker::{Broker, ConsumerHandle, Subscription};
use crate::consumer::deliver;
use crate::error::BrokerError;

#[derive(Debug, Clone)]
struct Record {
    key: String,
    payload: Vec<u8>,
}

#[derive(Debug)]
struct TopicLog {
    records: Vec<Record>,
    committed: HashMap<String, usize>,
    appended: watch::Sender<usize>,
}

impl TopicLog {
    fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            records: Vec::new(),
            committed: HashMap::new(),
            appended,
        }
    }
}

type Topics = Arc<Mutex<HashMap<String, TopicLog>>>;

/// A process-local log shared by every service in the process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    topics: Topics,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bodies published to `topic`, in order.
    pub async fn payloads(&self, topic: &str) -> Vec<Vec<u8>> {
        self.topics.lock().await.get(topic).map_or_else(Vec::new, |log| {
            log.records.iter().map(|r| r.payload.clone()).collect()
        })
    }

    /// Message keys published to `topic`, in order.
    pub async fn keys(&self, topic: &str) -> Vec<String> {
        self.topics.lock().await.get(topic).map_or_else(Vec::new, |log| {
            log.records.iter().map(|r| r.key.clone()).collect()
        })
    }

    /// Envelopes published to `topic`, skipping undecodable bodies.
    pub async fn envelopes(&self, topic: &str) -> Vec<RawEnvelope> {
        self.payloads(topic)
            .await
            .iter()
            .filter_map(|body| RawEnvelope::from_bytes(body).ok())
            .collect()
    }

    /// The committed offset of `group_id` on `topic`, if the group exists.
    pub async fn committed_offset(&self, topic: &str, group_id: &str) -> Option<usize> {
        self.topics
            .lock()
            .await
            .get(topic)
            .and_then(|log| log.committed.get(group_id).copied())
    }

    /// Waits until every consumer group has committed every record of its
    /// topic. Returns `false` if `timeout` elapses first.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let caught_up = self.topics.lock().await.values().all(|log| {
                log.committed
                    .values()
                    .all(|offset| *offset >= log.records.len())
            });
            if caught_up {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

async fn next_record(topics: &Topics, topic: &str, group_id: &str) -> Option<(usize, Record)> {
    let topics = topics.lock().await;
    let log = topics.get(topic)?;
    let offset = log.committed.get(group_id).copied().unwrap_or(0);
    log.records.get(offset).cloned().map(|record| (offset, record))
}

async fn commit(topics: &Topics, topic: &str, group_id: &str, next_offset: usize) {
    if let Some(log) = topics.lock().await.get_mut(topic) {
        let committed = log.committed.entry(group_id.to_owned()).or_insert(0);
        *committed = (*committed).max(next_offset);
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut topics = self.topics.lock().await;
        let log = topics.entry(topic.to_owned()).or_insert_with(TopicLog::new);
        log.records.push(Record {
            key: key.to_owned(),
            payload,
        });
        log.appended.send_replace(log.records.len());
        debug!(topic = %topic, key = %key, offset = log.records.len() - 1, "record appended");
        Ok(())
    }

    async fn subscribe(&self, subscription: Subscription) -> Result<ConsumerHandle, BrokerError> {
        let mut appended = {
            let mut topics = self.topics.lock().await;
            let log = topics
                .entry(subscription.topic.clone())
                .or_insert_with(TopicLog::new);
            log.committed
                .entry(subscription.group_id.clone())
                .or_insert(0);
            log.appended.subscribe()
        };

        info!(
            topic = %subscription.topic,
            group_id = %subscription.group_id,
            "consumer started"
        );

        let topic = subscription.topic.clone();
        let group_id = subscription.group_id.clone();
        let topics = Arc::clone(&self.topics);
        let task = tokio::spawn(async move {
            loop {
                drop(appended.borrow_and_update());
                match next_record(&topics, &subscription.topic, &subscription.group_id).await {
                    Some((offset, record)) => {
                        deliver(&subscription, Some(&record.key), &record.payload).await;
                        commit(
                            &topics,
                            &subscription.topic,
                            &subscription.group_id,
                            offset + 1,
                        )
                        .await;
                    }
                    None => {
                        if appended.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(ConsumerHandle::new(topic, group_id, task))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use emporium_core::envelope::{EventKind, Topic};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::broker::EnvelopeHandler;
    use crate::dead_letter::{DeadLetter, DeadLetterSink};

    #[derive(Default)]
    struct CountingHandler {
        seen: Mutex<Vec<RawEnvelope>>,
    }

    #[async_trait]
    impl EnvelopeHandler for CountingHandler {
        async fn handle(&self, envelope: RawEnvelope) {
            self.seen.lock().await.push(envelope);
        }
    }

    struct SleepyHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EnvelopeHandler for SleepyHandler {
        async fn handle(&self, _envelope: RawEnvelope) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        letters: Mutex<Vec<DeadLetter>>,
    }

    #[async_trait]
    impl DeadLetterSink for CollectingSink {
        async fn send(&self, letter: DeadLetter) {
            self.letters.lock().await.push(letter);
        }
    }

    fn envelope(kind: EventKind) -> RawEnvelope {
        RawEnvelope {
            message_id: Uuid::new_v4(),
            kind,
            topic: Topic::Product.as_str().to_owned(),
            payload: json!({ "id": Uuid::new_v4(), "title": "lamp" }),
            correlation_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    async fn publish(broker: &InMemoryBroker, envelope: &RawEnvelope) {
        broker
            .publish(
                Topic::Product.as_str(),
                envelope.kind.as_str(),
                envelope.to_bytes().unwrap(),
            )
            .await
            .unwrap();
    }

    fn subscription(
        group_id: &str,
        handler: Arc<dyn EnvelopeHandler>,
        sink: Arc<dyn DeadLetterSink>,
    ) -> Subscription {
        Subscription {
            topic: Topic::Product.as_str().to_owned(),
            group_id: group_id.to_owned(),
            handler,
            handler_timeout: Duration::from_millis(50),
            max_delivery_attempts: 2,
            dead_letters: sink,
        }
    }

    #[tokio::test]
    async fn test_each_group_receives_every_message_in_order() {
        // Arrange
        let broker = InMemoryBroker::new();
        let sink = Arc::new(CollectingSink::default());
        let cart = Arc::new(CountingHandler::default());
        let order = Arc::new(CountingHandler::default());
        let first = envelope(EventKind::Create);
        let second = envelope(EventKind::Update);
        publish(&broker, &first).await;

        // Act
        broker
            .subscribe(subscription("cart-service-product-replica", cart.clone(), sink.clone()))
            .await
            .unwrap();
        broker
            .subscribe(subscription("order-service-product-replica", order.clone(), sink))
            .await
            .unwrap();
        publish(&broker, &second).await;
        assert!(broker.settle(Duration::from_secs(2)).await);

        // Assert
        for handler in [cart, order] {
            let seen = handler.seen.lock().await;
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0].message_id, first.message_id);
            assert_eq!(seen[1].message_id, second.message_id);
        }
    }

    #[tokio::test]
    async fn test_restarted_consumer_resumes_from_committed_offset() {
        // Arrange
        let broker = InMemoryBroker::new();
        let sink = Arc::new(CollectingSink::default());
        let handler = Arc::new(CountingHandler::default());
        publish(&broker, &envelope(EventKind::Create)).await;
        let consumer = broker
            .subscribe(subscription("group", handler.clone(), sink.clone()))
            .await
            .unwrap();
        assert!(broker.settle(Duration::from_secs(2)).await);
        consumer.abort();

        // Act
        publish(&broker, &envelope(EventKind::Update)).await;
        broker
            .subscribe(subscription("group", handler.clone(), sink))
            .await
            .unwrap();
        assert!(broker.settle(Duration::from_secs(2)).await);

        // Assert
        let seen = handler.seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].kind, EventKind::Update);
        assert_eq!(
            broker.committed_offset(Topic::Product.as_str(), "group").await,
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_undecodable_message_is_dead_lettered_and_committed() {
        // Arrange
        let broker = InMemoryBroker::new();
        let sink = Arc::new(CollectingSink::default());
        let handler = Arc::new(CountingHandler::default());
        broker
            .publish(Topic::Product.as_str(), "CREATE", b"not json".to_vec())
            .await
            .unwrap();

        // Act
        broker
            .subscribe(subscription("group", handler.clone(), sink.clone()))
            .await
            .unwrap();
        assert!(broker.settle(Duration::from_secs(2)).await);

        // Assert
        assert!(handler.seen.lock().await.is_empty());
        let letters = sink.letters.lock().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].payload, "not json");
        assert_eq!(letters[0].key.as_deref(), Some("CREATE"));
    }

    #[tokio::test]
    async fn test_invalid_envelope_is_discarded_without_dead_letter() {
        let broker = InMemoryBroker::new();
        let sink = Arc::new(CollectingSink::default());
        let handler = Arc::new(CountingHandler::default());
        let mut missing_id = envelope(EventKind::Update);
        missing_id.payload = json!({ "title": "lamp" });
        publish(&broker, &missing_id).await;

        broker
            .subscribe(subscription("group", handler.clone(), sink.clone()))
            .await
            .unwrap();
        assert!(broker.settle(Duration::from_secs(2)).await);

        assert!(handler.seen.lock().await.is_empty());
        assert!(sink.letters.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_handler_timeout_redelivers_then_dead_letters() {
        // Arrange
        let broker = InMemoryBroker::new();
        let sink = Arc::new(CollectingSink::default());
        let handler = Arc::new(SleepyHandler {
            calls: AtomicUsize::new(0),
        });
        publish(&broker, &envelope(EventKind::Create)).await;

        // Act
        broker
            .subscribe(subscription("group", handler.clone(), sink.clone()))
            .await
            .unwrap();
        assert!(broker.settle(Duration::from_secs(5)).await);

        // Assert
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        let letters = sink.letters.lock().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 2);
        assert!(letters[0].reason.contains("timed out"));
    }
}
