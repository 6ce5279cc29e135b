//! # Forq Client
//!
//! Asynchronous client for a Forq message-queue server.
//!
//! This library provides:
//! - A [`Transport`] abstraction over the server's HTTP API, with an
//!   [`HttpTransport`] implementation using long polling
//! - [`AsyncConsumer`], which streams messages into a channel and settles
//!   ack/nack requests coming back from the application
//! - [`AsyncProducer`], which sends production requests read from a channel
//! - Graceful shutdown: buffered acks, nacks and productions are still sent
//!   before a worker reports completion
//!
//! ## Module Organization
//!
//! - [`config`] - Client configuration and loading
//! - [`consumer`] - Background consumer
//! - [`error`] - Error types and server error codes
//! - [`http`] - HTTP transport
//! - [`message`] - Queue names, message ids and payloads
//! - [`producer`] - Background producer
//! - [`shutdown`] - Shutdown and completion signals
//! - [`transport`] - Transport trait and long-poll constraints

pub mod config;
pub mod consumer;
pub mod error;
pub mod http;
pub mod message;
pub mod producer;
pub mod shutdown;
pub mod transport;

#[cfg(test)]
mod mock_transport;

// Re-export commonly used types at crate root for convenience
pub use config::ClientConfig;
pub use consumer::{AsyncConsumer, ConsumerChannels};
pub use error::{ConfigurationError, ErrorCode, ErrorResponse, QueueError};
pub use http::{HttpTransport, API_KEY_HEADER};
pub use message::{Message, MessageId, NewMessage, QueueName, QueuedProduction};
pub use producer::AsyncProducer;
pub use shutdown::{CompletionSignal, SendMode, ShutdownSignal, WorkerState};
pub use transport::{
    ensure_long_poll_timeout, minimum_consumer_timeout, Transport, LONG_POLL_MAX,
    LONG_POLL_SAFETY_MARGIN,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
