//! Asynchronous, channel-driven consumer.
//!
//! [`AsyncConsumer`] runs two background tasks over one shared [`Transport`]:
//!
//! - the **consume loop** long-polls the queue and pushes every message into
//!   the application's message channel;
//! - the **ack/nack loop** takes message ids from the application's ack and
//!   nack channels and settles them on the server.
//!
//! Transport failures are forwarded to the application's error channel.
//!
//! ## Shutdown
//!
//! [`AsyncConsumer::stop`] only requests shutdown. The consume loop exits at
//! its next check; a poll already in flight is allowed to finish. A message
//! that can no longer be handed over is simply not acknowledged, so the
//! server redelivers it.
//!
//! The ack/nack loop instead drains: every id already buffered in either
//! channel is still sent to the server, since it represents finished
//! application work. While draining, errors are forwarded only if the error
//! channel has room.
//!
//! ## Example
//!
//! ```no_run
//! use forq_client::{AsyncConsumer, ClientConfig, ConsumerChannels, HttpTransport};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::consumer(ClientConfig::new(
//!     "http://localhost:8080",
//!     "secret",
//! ))?);
//!
//! let (message_tx, mut message_rx) = mpsc::channel(16);
//! let (ack_tx, ack_rx) = mpsc::channel(16);
//! let (_nack_tx, nack_rx) = mpsc::channel(16);
//! let (error_tx, _error_rx) = mpsc::channel(16);
//!
//! let mut consumer = AsyncConsumer::new(
//!     transport,
//!     "orders",
//!     ConsumerChannels::new(message_tx, ack_rx, nack_rx, error_tx),
//! )?;
//! consumer.start()?;
//!
//! if let Some(message) = message_rx.recv().await {
//!     ack_tx.send(message.id.clone()).await?;
//! }
//!
//! consumer.close().await;
//! # Ok(())
//! # }
//! ```

use crate::error::QueueError;
use crate::message::{Message, MessageId, QueueName};
use crate::shutdown::{
    hand_off, CompletionSignal, Delivery, Lifecycle, SendMode, ShutdownSignal, WorkerState,
};
use crate::transport::{ensure_long_poll_timeout, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

const COMPONENT: &str = "AsyncConsumer";

/// Application-owned channel ends wired into an [`AsyncConsumer`]
#[derive(Debug)]
pub struct ConsumerChannels {
    /// Receives every consumed message
    pub messages: mpsc::Sender<Message>,
    /// Ids to acknowledge
    pub acks: mpsc::Receiver<MessageId>,
    /// Ids to reject
    pub nacks: mpsc::Receiver<MessageId>,
    /// Receives failures from background transport calls
    pub errors: mpsc::Sender<QueueError>,
}

impl ConsumerChannels {
    pub fn new(
        messages: mpsc::Sender<Message>,
        acks: mpsc::Receiver<MessageId>,
        nacks: mpsc::Receiver<MessageId>,
        errors: mpsc::Sender<QueueError>,
    ) -> Self {
        Self {
            messages,
            acks,
            nacks,
            errors,
        }
    }
}

/// Background consumer for a single queue
pub struct AsyncConsumer<T: Transport + 'static> {
    transport: Arc<T>,
    queue: QueueName,
    channels: Option<ConsumerChannels>,
    lifecycle: Lifecycle,
}

impl<T: Transport + 'static> AsyncConsumer<T> {
    /// Create a consumer in the `Created` state.
    ///
    /// Fails with a configuration error if the transport's request timeout
    /// could cut a long poll short. No request is made.
    pub fn new(
        transport: Arc<T>,
        queue: impl Into<QueueName>,
        channels: ConsumerChannels,
    ) -> Result<Self, QueueError> {
        ensure_long_poll_timeout(transport.request_timeout())?;

        Ok(Self {
            transport,
            queue: queue.into(),
            channels: Some(channels),
            lifecycle: Lifecycle::new(COMPONENT),
        })
    }

    /// Spawn the consume loop and the ack/nack loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), QueueError> {
        self.lifecycle.mark_started()?;
        let ConsumerChannels {
            messages,
            acks,
            nacks,
            errors,
        } = self
            .channels
            .take()
            .ok_or_else(|| QueueError::AlreadyStarted {
                component: COMPONENT.to_string(),
            })?;

        let shutdown = self.lifecycle.shutdown().clone();

        let consume = tokio::spawn(consume_loop(
            self.transport.clone(),
            self.queue.clone(),
            messages,
            errors.clone(),
            shutdown.clone(),
        ));

        let settle = tokio::spawn(
            AckNackLoop {
                transport: self.transport.clone(),
                queue: self.queue.clone(),
                acks,
                nacks,
                errors,
                shutdown,
            }
            .run(),
        );

        let completion = self.lifecycle.completion().clone();
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let (consume, settle) = tokio::join!(consume, settle);
            for (name, joined) in [("consume", consume), ("ack/nack", settle)] {
                if let Err(e) = joined {
                    error!(queue = %queue, task = name, error = %e, "Consumer task ended abnormally");
                }
            }
            info!(queue = %queue, "Consumer stopped");
            completion.complete();
        });

        info!(queue = %self.queue, "Consumer started");
        Ok(())
    }

    /// Request shutdown. Idempotent and non-blocking.
    pub fn stop(&self) {
        if !self.lifecycle.shutdown().is_triggered() {
            debug!(queue = %self.queue, "Consumer shutdown requested");
        }
        self.lifecycle.stop();
    }

    /// Wait until both loops have exited
    pub async fn wait(&self) {
        self.lifecycle.wait().await
    }

    /// Stop, then wait for both loops to exit
    pub async fn close(&self) {
        self.stop();
        self.wait().await
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    /// Handle that lets other tasks request shutdown
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.lifecycle.shutdown().clone()
    }

    /// Signal that fires once both loops have exited
    pub fn completion_signal(&self) -> CompletionSignal {
        self.lifecycle.completion().clone()
    }

    /// Queue this consumer reads from
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }
}

// ============================================================================
// Consume Loop
// ============================================================================

async fn consume_loop<T: Transport>(
    transport: Arc<T>,
    queue: QueueName,
    messages: mpsc::Sender<Message>,
    errors: mpsc::Sender<QueueError>,
    shutdown: ShutdownSignal,
) {
    debug!(queue = %queue, "Consume loop started");

    while !shutdown.is_triggered() {
        match transport.consume_one(&queue).await {
            Ok(Some(message)) => {
                let id = message.id.clone();
                match hand_off(&messages, message, SendMode::Blocking, &shutdown).await {
                    Delivery::Delivered => trace!(queue = %queue, message_id = %id, "Message handed over"),
                    Delivery::Abandoned | Delivery::Dropped => {
                        debug!(queue = %queue, message_id = %id, "Message left unacknowledged for redelivery");
                    }
                    Delivery::Closed => {
                        debug!(queue = %queue, "Message channel closed by receiver");
                        break;
                    }
                }
            }
            // The long poll already waited; poll again straight away
            Ok(None) => {}
            Err(e) => {
                hand_off(&errors, e, SendMode::Blocking, &shutdown).await;
            }
        }
    }

    debug!(queue = %queue, "Consume loop exited");
}

// ============================================================================
// Ack/Nack Loop
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Ack,
    Nack,
}

impl Settlement {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Nack => "nack",
        }
    }
}

enum Event {
    Shutdown,
    Request(Settlement, MessageId),
    ChannelClosed(Settlement),
}

struct AckNackLoop<T: Transport> {
    transport: Arc<T>,
    queue: QueueName,
    acks: mpsc::Receiver<MessageId>,
    nacks: mpsc::Receiver<MessageId>,
    errors: mpsc::Sender<QueueError>,
    shutdown: ShutdownSignal,
}

impl<T: Transport> AckNackLoop<T> {
    async fn run(mut self) {
        debug!(queue = %self.queue, "Ack/nack loop started");

        loop {
            if self.shutdown.is_triggered() {
                self.drain().await;
                break;
            }

            // No `biased;` here: acks must not starve nacks
            let event = tokio::select! {
                _ = self.shutdown.triggered() => Event::Shutdown,
                ack = self.acks.recv() => match ack {
                    Some(id) => Event::Request(Settlement::Ack, id),
                    None => Event::ChannelClosed(Settlement::Ack),
                },
                nack = self.nacks.recv() => match nack {
                    Some(id) => Event::Request(Settlement::Nack, id),
                    None => Event::ChannelClosed(Settlement::Nack),
                },
            };

            match event {
                Event::Shutdown => {
                    self.drain().await;
                    break;
                }
                Event::ChannelClosed(kind) => {
                    debug!(queue = %self.queue, channel = kind.as_str(), "Input channel closed");
                    break;
                }
                Event::Request(kind, id) => {
                    let Err(e) = self.settle(kind, &id).await else {
                        continue;
                    };
                    if hand_off(&self.errors, e, SendMode::Blocking, &self.shutdown).await
                        == Delivery::Abandoned
                    {
                        self.drain().await;
                        break;
                    }
                }
            }
        }

        debug!(queue = %self.queue, "Ack/nack loop exited");
    }

    async fn settle(&self, kind: Settlement, id: &MessageId) -> Result<(), QueueError> {
        match kind {
            Settlement::Ack => self.transport.ack(&self.queue, id).await,
            Settlement::Nack => self.transport.nack(&self.queue, id).await,
        }
    }

    /// Settle everything already buffered, without waiting for more
    async fn drain(&mut self) {
        let mut drained = 0usize;

        while let Some((kind, id)) = self.next_buffered() {
            drained += 1;
            if let Err(e) = self.settle(kind, &id).await {
                if hand_off(&self.errors, e, SendMode::BestEffort, &self.shutdown).await
                    == Delivery::Dropped
                {
                    debug!(queue = %self.queue, message_id = %id, "Error channel full while draining; error dropped");
                }
            }
        }

        debug!(queue = %self.queue, drained, "Ack/nack drain complete");
    }

    fn next_buffered(&mut self) -> Option<(Settlement, MessageId)> {
        if let Ok(id) = self.acks.try_recv() {
            return Some((Settlement::Ack, id));
        }
        if let Ok(id) = self.nacks.try_recv() {
            return Some((Settlement::Nack, id));
        }
        None
    }
}
