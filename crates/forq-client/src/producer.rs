//! Asynchronous, channel-driven producer.
//!
//! [`AsyncProducer`] reads [`QueuedProduction`] requests from an
//! application-owned channel and sends each one to the server through a
//! [`Transport`]. Failures are forwarded to the application's error channel.
//!
//! On shutdown every request already sitting in the channel is still sent
//! before the producer reports completion.

use crate::error::QueueError;
use crate::message::QueuedProduction;
use crate::shutdown::{
    hand_off, CompletionSignal, Delivery, Lifecycle, SendMode, ShutdownSignal, WorkerState,
};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;

const COMPONENT: &str = "AsyncProducer";

/// Background producer fed by a channel of production requests
pub struct AsyncProducer<T: Transport + 'static> {
    transport: Arc<T>,
    channels: Option<(mpsc::Receiver<QueuedProduction>, mpsc::Sender<QueueError>)>,
    lifecycle: Lifecycle,
}

impl<T: Transport + 'static> AsyncProducer<T> {
    /// Create a producer in the `Created` state.
    ///
    /// Produce calls return immediately on the server, so the transport's
    /// request timeout is not checked here.
    pub fn new(
        transport: Arc<T>,
        productions: mpsc::Receiver<QueuedProduction>,
        errors: mpsc::Sender<QueueError>,
    ) -> Self {
        Self {
            transport,
            channels: Some((productions, errors)),
            lifecycle: Lifecycle::new(COMPONENT),
        }
    }

    /// Spawn the produce loop. Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), QueueError> {
        self.lifecycle.mark_started()?;
        let (productions, errors) =
            self.channels
                .take()
                .ok_or_else(|| QueueError::AlreadyStarted {
                    component: COMPONENT.to_string(),
                })?;

        let produce = tokio::spawn(
            ProduceLoop {
                transport: self.transport.clone(),
                productions,
                errors,
                shutdown: self.lifecycle.shutdown().clone(),
            }
            .run(),
        );

        let completion = self.lifecycle.completion().clone();
        tokio::spawn(async move {
            if let Err(e) = produce.await {
                error!(error = %e, "Producer task ended abnormally");
            }
            info!("Producer stopped");
            completion.complete();
        });

        info!("Producer started");
        Ok(())
    }

    /// Request shutdown. Idempotent and non-blocking.
    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    /// Wait until the produce loop has exited, including its drain
    pub async fn wait(&self) {
        self.lifecycle.wait().await
    }

    pub async fn close(&self) {
        self.stop();
        self.wait().await
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.lifecycle.shutdown().clone()
    }

    pub fn completion_signal(&self) -> CompletionSignal {
        self.lifecycle.completion().clone()
    }
}

enum Event {
    Shutdown,
    Request(QueuedProduction),
    ChannelClosed,
}

struct ProduceLoop<T: Transport> {
    transport: Arc<T>,
    productions: mpsc::Receiver<QueuedProduction>,
    errors: mpsc::Sender<QueueError>,
    shutdown: ShutdownSignal,
}

impl<T: Transport> ProduceLoop<T> {
    async fn run(mut self) {
        debug!("Produce loop started");

        loop {
            let event = tokio::select! {
                biased;

                _ = self.shutdown.triggered() => Event::Shutdown,
                request = self.productions.recv() => match request {
                    Some(request) => Event::Request(request),
                    None => Event::ChannelClosed,
                },
            };

            match event {
                Event::Shutdown => {
                    self.drain().await;
                    break;
                }
                Event::ChannelClosed => {
                    debug!("Production channel closed");
                    break;
                }
                Event::Request(request) => {
                    let Err(e) = self.produce(&request).await else {
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

        debug!("Produce loop exited");
    }

    async fn produce(&self, request: &QueuedProduction) -> Result<(), QueueError> {
        let result = self
            .transport
            .produce(&request.message, &request.queue)
            .await;
        if result.is_ok() {
            trace!(queue = %request.queue, "Message produced");
        }
        result
    }

    async fn drain(&mut self) {
        let mut drained = 0usize;

        while let Ok(request) = self.productions.try_recv() {
            drained += 1;
            if let Err(e) = self.produce(&request).await {
                if hand_off(&self.errors, e, SendMode::BestEffort, &self.shutdown).await
                    == Delivery::Dropped
                {
                    debug!(queue = %request.queue, "Error channel full while draining; error dropped");
                }
            }
        }

        debug!(drained, "Produce drain complete");
    }
}
