//! Shared test mocks and utilities for the Emporium services.

mod broker;
mod clock;
mod dead_letter;
mod store;

pub use broker::{FailingBroker, broker_client, in_memory_client};
pub use clock::FixedClock;
pub use dead_letter::RecordingDeadLetterSink;
pub use store::{FailingDocumentStore, FlakyDocumentStore};
