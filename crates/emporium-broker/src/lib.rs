//! Emporium Broker: the per-service publish/subscribe client.
//!
//! Services talk to the shared log through [`BrokerClient`], which wraps a
//! [`Broker`] transport:
//! - [`InMemoryBroker`]: a process-local log with durable consumer-group
//!   offsets, used for tests and single-process runs.
//! - `KafkaBroker` (feature `kafka`): rdkafka producer and consumer groups.
//!
//! Consumers commit a message's offset only after the handler returns, so
//! delivery is at-least-once per consumer group.

pub mod broker;
pub mod client;
pub mod config;
mod consumer;
pub mod dead_letter;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod retry;

pub use broker::{Broker, ConsumerHandle, EnvelopeHandler, Subscription};
pub use client::BrokerClient;
pub use config::BrokerConfig;
pub use dead_letter::{BrokerDeadLetterSink, DeadLetter, DeadLetterSink, TracingDeadLetterSink};
pub use error::BrokerError;
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::InMemoryBroker;
