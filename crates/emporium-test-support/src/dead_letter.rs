//! Dead-letter sink that keeps every letter for later assertions.

use std::sync::Mutex;

use async_trait::async_trait;
use emporium_broker::{DeadLetter, DeadLetterSink};

/// Records every dead letter it receives.
#[derive(Debug, Default)]
pub struct RecordingDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
}

impl RecordingDeadLetterSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded letters.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetterSink {
    async fn send(&self, letter: DeadLetter) {
        self.letters.lock().unwrap().push(letter);
    }
}
