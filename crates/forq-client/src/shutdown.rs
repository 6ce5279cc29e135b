//! Shutdown and completion signals shared by the background workers, plus the
//! two ways a worker hands a value to an application-owned channel.
//!
//! A [`ShutdownSignal`] is a one-shot broadcast: it fires at most once, any
//! number of callers may trigger it concurrently, and triggering never blocks.
//! A [`CompletionSignal`] fires once every loop of a worker has exited.

use crate::error::QueueError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Signals
// ============================================================================

/// One-shot, idempotent request for a worker to stop accepting new work
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Safe to call any number of times from any task.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Check whether the signal has fired
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal has fired
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

/// Fires once all background work of a worker has ceased
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    token: CancellationToken,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn complete(&self) {
        self.token.cancel();
    }

    /// Check whether the worker has finished
    pub fn is_complete(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the worker has finished
    pub async fn completed(&self) {
        self.token.cancelled().await
    }
}

// ============================================================================
// Worker Lifecycle
// ============================================================================

/// Lifecycle state of a background worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, loops not yet spawned
    Created,
    /// Loops running and accepting work
    Running,
    /// Shutdown requested, loops still finishing or draining
    Stopping,
    /// All loops have exited
    Stopped,
}

/// Signals and start bookkeeping shared by the consumer and the producer
#[derive(Debug)]
pub(crate) struct Lifecycle {
    component: &'static str,
    started: bool,
    shutdown: ShutdownSignal,
    completion: CompletionSignal,
}

impl Lifecycle {
    pub(crate) fn new(component: &'static str) -> Self {
        Self {
            component,
            started: false,
            shutdown: ShutdownSignal::new(),
            completion: CompletionSignal::new(),
        }
    }

    /// Record the Created -> Running transition; fails on a second start
    pub(crate) fn mark_started(&mut self) -> Result<(), QueueError> {
        if self.started {
            return Err(QueueError::AlreadyStarted {
                component: self.component.to_string(),
            });
        }
        self.started = true;
        Ok(())
    }

    pub(crate) fn state(&self) -> WorkerState {
        if self.completion.is_complete() {
            WorkerState::Stopped
        } else if !self.started {
            WorkerState::Created
        } else if self.shutdown.is_triggered() {
            WorkerState::Stopping
        } else {
            WorkerState::Running
        }
    }

    pub(crate) fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub(crate) fn completion(&self) -> &CompletionSignal {
        &self.completion
    }

    pub(crate) fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Resolve once all loops have exited; immediately if never started
    pub(crate) async fn wait(&self) {
        if !self.started {
            return;
        }
        self.completion.completed().await
    }
}

// ============================================================================
// Channel Hand-off
// ============================================================================

/// How a worker hands a value to an application-owned channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Wait for channel capacity, giving up only if shutdown fires first.
    /// Used during normal operation.
    Blocking,

    /// Never wait; drop the value if the channel is full.
    /// Used while draining so a slow reader cannot stall shutdown.
    BestEffort,
}

/// Result of handing a value to an application-owned channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The channel accepted the value
    Delivered,
    /// Shutdown fired while waiting for capacity
    Abandoned,
    /// The channel was full and the value was dropped
    Dropped,
    /// The application dropped the receiving side
    Closed,
}

/// Send `value` to `tx` using the given mode.
///
/// In [`SendMode::Blocking`] an already-available slot wins over a fired
/// shutdown signal, so a value is only abandoned when the channel is actually
/// full.
pub(crate) async fn hand_off<V>(
    tx: &mpsc::Sender<V>,
    value: V,
    mode: SendMode,
    shutdown: &ShutdownSignal,
) -> Delivery {
    match mode {
        SendMode::Blocking => {
            tokio::select! {
                biased;

                sent = tx.send(value) => match sent {
                    Ok(()) => Delivery::Delivered,
                    Err(_) => Delivery::Closed,
                },
                _ = shutdown.triggered() => Delivery::Abandoned,
            }
        }
        SendMode::BestEffort => match tx.try_send(value) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        },
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
