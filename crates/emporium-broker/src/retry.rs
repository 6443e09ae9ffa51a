//! Backoff policies.
//!
//! Uses `backon` exponential backoff with jitter for publish retries and for
//! re-delivering a message whose handler timed out or panicked.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for publish retries on transient transport errors.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Retries: `max_attempts - 1`
#[must_use]
pub fn publish_backoff(max_attempts: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(max_attempts.saturating_sub(1))
        .with_jitter()
}

/// Backoff between re-deliveries of the same message.
///
/// - Min delay: 100ms
/// - Max delay: 5s
#[must_use]
pub fn redelivery_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_jitter()
}

/// Backoff for consumer-group setup at start-up.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 5
#[must_use]
pub fn subscribe_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(5)
        .with_jitter()
}
