//! Replica projector.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use emporium_broker::{BrokerClient, ConsumerHandle, DeadLetter, DeadLetterSink, EnvelopeHandler};
use emporium_core::document::{Collection, Document, DocumentStore};
use emporium_core::envelope::{Envelope, EnvelopeError, RawEnvelope, Topic};
use emporium_core::error::DomainError;
use tracing::{Instrument, debug, error, info_span, warn};

/// What applying one envelope did to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// A new document was inserted.
    Inserted,
    /// `CREATE` for a document that already exists; nothing changed.
    AlreadyPresent,
    /// An existing document was merged.
    Merged,
    /// The targeted document does not exist; nothing changed.
    Absent,
    /// The document was removed.
    Deleted,
    /// The document was merged or inserted.
    Upserted,
    /// A bulk seed was applied.
    Seeded {
        /// Snapshots inserted.
        inserted: usize,
        /// Snapshots skipped because they already existed.
        existing: usize,
    },
}

fn default_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(3)
        .with_jitter()
}

/// Applies envelopes for one snapshot type to one collection.
///
/// The consumer name identifies the projector in the processed-message log
/// and in dead letters; use the consumer-group identifier.
pub struct ReplicaProjector<T> {
    store: Arc<dyn DocumentStore>,
    consumer: String,
    dead_letters: Arc<dyn DeadLetterSink>,
    backoff: ExponentialBuilder,
    _snapshot: PhantomData<fn() -> T>,
}

impl<T: Document> ReplicaProjector<T> {
    /// Creates a projector writing to `T::COLLECTION` in `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        consumer: impl Into<String>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            store,
            consumer: consumer.into(),
            dead_letters,
            backoff: default_backoff(),
            _snapshot: PhantomData,
        }
    }

    /// Overrides the backoff used for transient storage failures.
    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    /// The consumer name.
    #[must_use]
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Applies one typed envelope.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn apply(&self, envelope: &Envelope<T>) -> Result<ProjectionOutcome, DomainError> {
        let replica = Collection::<T>::new(self.store.as_ref());
        match envelope {
            Envelope::Create(doc) => Ok(if replica.insert_if_absent(doc).await? {
                ProjectionOutcome::Inserted
            } else {
                ProjectionOutcome::AlreadyPresent
            }),
            Envelope::Update(doc) => Ok(match replica.merge(doc).await? {
                Some(_) => ProjectionOutcome::Merged,
                None => ProjectionOutcome::Absent,
            }),
            Envelope::Delete(id) => Ok(if replica.delete(*id).await? {
                ProjectionOutcome::Deleted
            } else {
                ProjectionOutcome::Absent
            }),
            Envelope::Upsert(doc) => {
                replica.upsert(doc).await?;
                Ok(ProjectionOutcome::Upserted)
            }
            Envelope::Insert(docs) => {
                let mut inserted = 0;
                for doc in docs {
                    if replica.insert_if_absent(doc).await? {
                        inserted += 1;
                    }
                }
                Ok(ProjectionOutcome::Seeded {
                    inserted,
                    existing: docs.len() - inserted,
                })
            }
        }
    }

    async fn already_processed(&self, raw: &RawEnvelope) -> bool {
        match self.store.is_processed(&self.consumer, raw.message_id).await {
            Ok(processed) => processed,
            Err(err) => {
                warn!(error = %err, "processed-message lookup failed, applying anyway");
                false
            }
        }
    }

    async fn mark_processed(&self, raw: &RawEnvelope) {
        if let Err(err) = self
            .store
            .record_processed(&self.consumer, raw.message_id)
            .await
        {
            warn!(error = %err, "failed to record processed message");
        }
    }

    async fn dead_letter(&self, raw: &RawEnvelope, reason: String, attempts: u32) {
        let body = raw.to_bytes().unwrap_or_default();
        self.dead_letters
            .send(DeadLetter::new(
                raw.topic.clone(),
                self.consumer.clone(),
                Some(raw.kind.as_str()),
                &body,
                reason,
                attempts,
            ))
            .await;
    }

    /// Decodes and applies one raw envelope, retrying transient storage
    /// failures. Returns the outcome, or `None` if the envelope was
    /// discarded, skipped as a replay, or dead-lettered.
    ///
    /// `CREATE`, `INSERT` and `UPSERT` go through the processed-message log
    /// so a replayed message cannot overwrite a later one. `UPDATE` and
    /// `DELETE` are not recorded.
    pub async fn project(&self, raw: RawEnvelope) -> Option<ProjectionOutcome> {
        let span = info_span!(
            "project",
            consumer = %self.consumer,
            collection = T::COLLECTION,
            topic = %raw.topic,
            kind = %raw.kind,
            message_id = %raw.message_id,
            correlation_id = %raw.correlation_id,
        );
        self.project_raw(raw).instrument(span).await
    }

    async fn project_raw(&self, raw: RawEnvelope) -> Option<ProjectionOutcome> {
        let envelope = match Envelope::<T>::decode(&raw) {
            Ok(envelope) => envelope,
            Err(err @ EnvelopeError::Malformed(_)) => {
                warn!(error = %err, "snapshot does not decode");
                self.dead_letter(&raw, err.to_string(), 1).await;
                return None;
            }
            Err(err) => {
                warn!(error = %err, "discarding invalid envelope");
                return None;
            }
        };

        let tracked = matches!(
            envelope,
            Envelope::Create(_) | Envelope::Insert(_) | Envelope::Upsert(_)
        );
        if tracked && self.already_processed(&raw).await {
            debug!("envelope already applied");
            return None;
        }

        let mut attempts = 0_u32;
        let result = {
            let this = self;
            let envelope = &envelope;
            let attempts = &mut attempts;
            (move || {
                *attempts += 1;
                this.apply(envelope)
            })
            .retry(self.backoff.clone())
            .when(DomainError::is_transient)
            .notify(|err: &DomainError, delay: Duration| {
                warn!(error = %err, delay_ms = delay.as_millis(), "retrying projection");
            })
            .await
        };

        match result {
            Ok(outcome) => {
                debug!(?outcome, "envelope applied");
                if tracked {
                    self.mark_processed(&raw).await;
                }
                Some(outcome)
            }
            Err(err) => {
                error!(error = %err, attempts, "projection failed");
                self.dead_letter(&raw, err.to_string(), attempts).await;
                None
            }
        }
    }
}

#[async_trait]
impl<T: Document> EnvelopeHandler for ReplicaProjector<T> {
    async fn handle(&self, envelope: RawEnvelope) {
        self.project(envelope).await;
    }
}

/// Starts a projector for `T` on `topic`, under the consumer group
/// `{client_id}-{purpose}`.
///
/// Returns `None` if the consumer could not be started; the failure is
/// logged by the broker client.
pub async fn start_projection<T: Document>(
    broker: &BrokerClient,
    store: Arc<dyn DocumentStore>,
    topic: Topic,
    purpose: &str,
) -> Option<ConsumerHandle> {
    let projector = ReplicaProjector::<T>::new(
        store,
        broker.consumer_group(purpose),
        broker.dead_letters(),
    );
    broker.subscribe(topic, purpose, Arc::new(projector)).await
}
