//! The transport contract used by the asynchronous workers.
//!
//! A transport performs exactly one round trip per call. The workers never
//! retry and never interrupt an in-flight call; they only decide when to make
//! the next one.

use crate::error::{ConfigurationError, QueueError};
use crate::message::{Message, MessageId, NewMessage, QueueName};
use async_trait::async_trait;
use std::time::Duration;

/// Longest time the server holds a consume request open before answering
/// that no message is available.
pub const LONG_POLL_MAX: Duration = Duration::from_secs(30);

/// Extra time a consumer-side request timeout must allow on top of
/// [`LONG_POLL_MAX`].
pub const LONG_POLL_SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Interface implemented by anything able to talk to the queue server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait up to the long-poll bound for one message.
    ///
    /// Returns `Ok(None)` when the bound elapses without a message.
    async fn consume_one(&self, queue: &QueueName) -> Result<Option<Message>, QueueError>;

    /// Acknowledge a delivered message, removing it from the queue
    async fn ack(&self, queue: &QueueName, id: &MessageId) -> Result<(), QueueError>;

    /// Reject a delivered message, returning it to the queue for redelivery
    async fn nack(&self, queue: &QueueName, id: &MessageId) -> Result<(), QueueError>;

    /// Add a new message to a queue
    async fn produce(&self, message: &NewMessage, queue: &QueueName) -> Result<(), QueueError>;

    /// Per-request timeout applied by the transport, `None` when disabled
    fn request_timeout(&self) -> Option<Duration>;
}

/// Smallest request timeout that cannot cut a legitimate long poll short
pub fn minimum_consumer_timeout() -> Duration {
    LONG_POLL_MAX + LONG_POLL_SAFETY_MARGIN
}

/// Reject request timeouts that would abort a long poll before the server
/// answers and misreport it as a transport failure.
pub fn ensure_long_poll_timeout(timeout: Option<Duration>) -> Result<(), ConfigurationError> {
    let minimum = minimum_consumer_timeout();
    match timeout {
        Some(timeout) if timeout < minimum => {
            Err(ConfigurationError::TimeoutTooShort { timeout, minimum })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
