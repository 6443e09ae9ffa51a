//! Per-message delivery shared by every transport.

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use emporium_core::envelope::RawEnvelope;
use tracing::{debug, warn};

use crate::broker::Subscription;
use crate::dead_letter::DeadLetter;
use crate::retry::redelivery_backoff;

/// Delivers one message to the subscription's handler.
///
/// Returns once the message may be committed: after the handler returned,
/// after the envelope was discarded as invalid, or after it was
/// dead-lettered. Handler timeouts and panics are retried in place until
/// `max_delivery_attempts` is reached.
pub(crate) async fn deliver(subscription: &Subscription, key: Option<&str>, body: &[u8]) {
    let envelope = match RawEnvelope::from_bytes(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(
                topic = %subscription.topic,
                group_id = %subscription.group_id,
                error = %err,
                "undecodable message"
            );
            dead_letter(subscription, key, body, err.to_string(), 1).await;
            return;
        }
    };

    if let Some(key) = key.filter(|key| *key != envelope.kind.as_str()) {
        warn!(
            topic = %subscription.topic,
            key = %key,
            kind = %envelope.kind,
            "message key does not match envelope kind"
        );
    }

    if let Err(err) = envelope.validate() {
        warn!(
            topic = %subscription.topic,
            group_id = %subscription.group_id,
            message_id = %envelope.message_id,
            error = %err,
            "discarding invalid envelope"
        );
        return;
    }

    let mut delays = redelivery_backoff().build();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let handler = Arc::clone(&subscription.handler);
        let message = envelope.clone();
        let mut task = tokio::spawn(async move { handler.handle(message).await });

        let failure = match tokio::time::timeout(subscription.handler_timeout, &mut task).await {
            Ok(Ok(())) => {
                debug!(
                    topic = %subscription.topic,
                    group_id = %subscription.group_id,
                    message_id = %envelope.message_id,
                    "message handled"
                );
                return;
            }
            Ok(Err(join_err)) => format!("handler failed: {join_err}"),
            Err(_) => {
                task.abort();
                format!(
                    "handler timed out after {}ms",
                    subscription.handler_timeout.as_millis()
                )
            }
        };

        if attempt >= subscription.max_delivery_attempts {
            dead_letter(subscription, key, body, failure, attempt).await;
            return;
        }

        warn!(
            topic = %subscription.topic,
            group_id = %subscription.group_id,
            message_id = %envelope.message_id,
            attempt,
            reason = %failure,
            "redelivering message"
        );
        tokio::time::sleep(delays.next().unwrap_or(Duration::from_secs(5))).await;
    }
}

async fn dead_letter(
    subscription: &Subscription,
    key: Option<&str>,
    body: &[u8],
    reason: String,
    attempts: u32,
) {
    subscription
        .dead_letters
        .send(DeadLetter::new(
            subscription.topic.clone(),
            subscription.group_id.clone(),
            key,
            body,
            reason,
            attempts,
        ))
        .await;
}
