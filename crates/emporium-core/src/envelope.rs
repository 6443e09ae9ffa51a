//! Event envelope and topic contracts.
//!
//! Every message on the shared log is a [`RawEnvelope`]: a kind, the topic it
//! was published to, and a JSON payload. Consumers turn it into a typed
//! [`Envelope`] with [`Envelope::decode`], which also enforces the identifier
//! rule: every kind except `INSERT` must carry a non-empty `id`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::document::Document;

/// The closed set of envelope kinds. Carried as the message key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// Insert if absent.
    Create,
    /// Merge into an existing document.
    Update,
    /// Remove by identifier.
    Delete,
    /// Merge or insert.
    Upsert,
    /// Bulk seed with an array payload.
    Insert,
}

impl EventKind {
    /// Wire representation, used as the message key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Upsert => "UPSERT",
            Self::Insert => "INSERT",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "UPSERT" => Ok(Self::Upsert),
            "INSERT" => Ok(Self::Insert),
            other => Err(EnvelopeError::UnknownKind(other.to_owned())),
        }
    }
}

/// Logical channels, one per entity type crossing a service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// User snapshots from the user service.
    User,
    /// Product snapshots from the product service.
    Product,
    /// Cart snapshots from the cart service.
    Cart,
    /// Cart snapshots emitted by the order saga.
    OrderCart,
    /// Product stock changes emitted by the order saga.
    OrderProduct,
}

impl Topic {
    /// Every topic in the system.
    pub const ALL: [Topic; 5] = [
        Topic::User,
        Topic::Product,
        Topic::Cart,
        Topic::OrderCart,
        Topic::OrderProduct,
    ];

    /// The channel name on the shared log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User-Topic",
            Self::Product => "Product-Topic",
            Self::Cart => "Cart-Topic",
            Self::OrderCart => "Order-Topic-Cart",
            Self::OrderProduct => "Order-Topic-Product",
        }
    }

    /// Name of the dead-letter channel paired with this topic.
    #[must_use]
    pub fn dead_letter_name(self) -> String {
        format!("{}-DLQ", self.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownTopic(s.to_owned()))
    }
}

/// Errors raised while encoding, decoding, or validating an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The message key is not one of the known kinds.
    #[error("unknown envelope kind: {0}")]
    UnknownKind(String),

    /// The topic name is not one of the known topics.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// A non-`INSERT` payload carries no usable identifier.
    #[error("{kind} envelope is missing a non-empty identifier")]
    MissingIdentifier {
        /// Kind of the rejected envelope.
        kind: EventKind,
    },

    /// An `INSERT` payload is not an array.
    #[error("INSERT envelope payload must be an array")]
    NotAnArray,

    /// The payload does not match the expected snapshot shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// The untyped form of a message, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    /// Unique message identifier, used to detect replays.
    pub message_id: Uuid,
    /// Envelope kind.
    pub kind: EventKind,
    /// Topic the message was published to.
    pub topic: String,
    /// Snapshot (or array of snapshots for `INSERT`).
    pub payload: Value,
    /// Correlation ID of the command that produced the message.
    pub correlation_id: Uuid,
    /// Publication timestamp.
    pub occurred_at: DateTime<Utc>,
}

impl RawEnvelope {
    /// Serializes the envelope into the message body.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Malformed` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }

    /// Parses a message body.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Malformed` if the body is not a valid envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }

    /// Checks the identifier rule without decoding the snapshot type.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::MissingIdentifier` when a non-`INSERT` payload
    /// has no non-nil `id`, and `EnvelopeError::NotAnArray` when an `INSERT`
    /// payload is not an array.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        match self.kind {
            EventKind::Insert => {
                if self.payload.is_array() {
                    Ok(())
                } else {
                    Err(EnvelopeError::NotAnArray)
                }
            }
            kind => payload_identifier(&self.payload)
                .map(|_| ())
                .ok_or(EnvelopeError::MissingIdentifier { kind }),
        }
    }

    /// Identifier carried by a single-snapshot payload, if any.
    #[must_use]
    pub fn identifier(&self) -> Option<Uuid> {
        payload_identifier(&self.payload)
    }
}

fn payload_identifier(payload: &Value) -> Option<Uuid> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .and_then(|id| Uuid::parse_str(id).ok())
        .filter(|id| !id.is_nil())
}

/// A typed envelope: one variant per kind, each carrying its snapshot.
///
/// `Delete` carries only the identifier; any additional snapshot fields on the
/// wire are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// Insert if absent.
    Create(T),
    /// Merge into an existing document.
    Update(T),
    /// Remove by identifier.
    Delete(Uuid),
    /// Merge or insert.
    Upsert(T),
    /// Bulk seed.
    Insert(Vec<T>),
}

impl<T> Envelope<T> {
    /// The kind of this envelope.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Create(_) => EventKind::Create,
            Self::Update(_) => EventKind::Update,
            Self::Delete(_) => EventKind::Delete,
            Self::Upsert(_) => EventKind::Upsert,
            Self::Insert(_) => EventKind::Insert,
        }
    }
}

impl<T: Document> Envelope<T> {
    /// Identifier of the targeted document (`None` for bulk inserts).
    #[must_use]
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Create(doc) | Self::Update(doc) | Self::Upsert(doc) => Some(doc.id()),
            Self::Delete(id) => Some(*id),
            Self::Insert(_) => None,
        }
    }

    /// Builds the JSON payload for this envelope.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Malformed` if a snapshot fails to serialize.
    pub fn to_payload(&self) -> Result<Value, EnvelopeError> {
        let result = match self {
            Self::Create(doc) | Self::Update(doc) | Self::Upsert(doc) => serde_json::to_value(doc),
            Self::Delete(id) => Ok(serde_json::json!({ "id": id })),
            Self::Insert(docs) => serde_json::to_value(docs),
        };
        result.map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Validates and decodes a raw envelope into its typed form.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::MissingIdentifier`/`NotAnArray` when the
    /// identifier rule fails and `EnvelopeError::Malformed` when the payload
    /// does not deserialize into `T`.
    pub fn decode(raw: &RawEnvelope) -> Result<Self, EnvelopeError> {
        raw.validate()?;
        let malformed = |e: serde_json::Error| EnvelopeError::Malformed(e.to_string());
        match raw.kind {
            EventKind::Create => Ok(Self::Create(
                serde_json::from_value(raw.payload.clone()).map_err(malformed)?,
            )),
            EventKind::Update => Ok(Self::Update(
                serde_json::from_value(raw.payload.clone()).map_err(malformed)?,
            )),
            EventKind::Upsert => Ok(Self::Upsert(
                serde_json::from_value(raw.payload.clone()).map_err(malformed)?,
            )),
            EventKind::Delete => raw
                .identifier()
                .map(Self::Delete)
                .ok_or(EnvelopeError::MissingIdentifier {
                    kind: EventKind::Delete,
                }),
            EventKind::Insert => Ok(Self::Insert(
                serde_json::from_value(raw.payload.clone()).map_err(malformed)?,
            )),
        }
    }
}
