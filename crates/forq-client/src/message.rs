//! Message types exchanged with the queue server, including core domain identifiers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Name of a logical queue on the server.
///
/// Queue names are opaque to the client. The server decides what is valid,
/// so no validation happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for QueueName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for QueueName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Server-assigned message identifier.
///
/// Used as the ack/nack token: the application sends it back through the
/// ack or nack channel once it has finished with the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an identifier received from the server
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message delivered by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
}

impl Message {
    /// Token to hand back through the ack or nack channel
    pub fn id(&self) -> &MessageId {
        &self.id
    }
}

/// A message to be produced into a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,

    /// Earliest time the server makes the message visible to consumers.
    /// Sent as milliseconds since the Unix epoch.
    #[serde(
        rename = "processAfter",
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub process_after: Option<DateTime<Utc>>,
}

impl NewMessage {
    /// Create new message with content, visible immediately
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            process_after: None,
        }
    }

    /// Delay visibility until an absolute point in time
    pub fn with_process_after(mut self, at: DateTime<Utc>) -> Self {
        self.process_after = Some(at);
        self
    }

    /// Delay visibility relative to now
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_process_after(Utc::now() + delay)
    }
}

/// A message paired with its destination queue; the unit of work of the
/// asynchronous producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedProduction {
    pub message: NewMessage,
    pub queue: QueueName,
}

impl QueuedProduction {
    pub fn new(message: NewMessage, queue: impl Into<QueueName>) -> Self {
        Self {
            message,
            queue: queue.into(),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
