//! Scriptable in-memory [`Transport`] for worker tests.

use crate::error::{ErrorCode, QueueError};
use crate::message::{Message, MessageId, NewMessage, QueueName};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// A transport call as observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Consume(QueueName),
    Ack(QueueName, MessageId),
    Nack(QueueName, MessageId),
    Produce(QueueName, String),
}

pub(crate) struct MockTransport {
    calls: Mutex<Vec<Call>>,
    deliveries: Mutex<VecDeque<Result<Option<Message>, QueueError>>>,
    failing: Mutex<HashSet<String>>,
    gate: Option<Arc<Semaphore>>,
    empty_poll_delay: Duration,
    request_timeout: Option<Duration>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            deliveries: Mutex::new(VecDeque::new()),
            failing: Mutex::new(HashSet::new()),
            gate: None,
            empty_poll_delay: Duration::from_millis(5),
            request_timeout: None,
        }
    }

    pub(crate) fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Make every ack, nack and produce wait for a permit from `gate`
    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Queue a result for a future `consume_one`
    pub(crate) fn deliver(&self, result: Result<Option<Message>, QueueError>) {
        self.deliveries.lock().unwrap().push_back(result);
    }

    /// Fail acks/nacks for this message id, or produces with this content
    pub(crate) fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn produced(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Produce(_, content) => Some(content),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn acked(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Ack(_, id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn nacked(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Nack(_, id) => Some(id),
                _ => None,
            })
            .collect()
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }

    fn outcome(&self, key: &str) -> Result<(), QueueError> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(QueueError::Api {
                status: 500,
                code: ErrorCode::Internal,
            });
        }
        Ok(())
    }
}

pub(crate) fn message(id: &str, content: &str) -> Message {
    Message {
        id: MessageId::new(id),
        content: content.to_string(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn consume_one(&self, queue: &QueueName) -> Result<Option<Message>, QueueError> {
        self.calls.lock().unwrap().push(Call::Consume(queue.clone()));
        let scripted = self.deliveries.lock().unwrap().pop_front();
        match scripted {
            Some(result) => {
                tokio::task::yield_now().await;
                result
            }
            None => {
                // Stand-in for a long poll that found nothing
                tokio::time::sleep(self.empty_poll_delay).await;
                Ok(None)
            }
        }
    }

    async fn ack(&self, queue: &QueueName, id: &MessageId) -> Result<(), QueueError> {
        self.pass_gate().await;
        self.calls
            .lock()
            .unwrap()
            .push(Call::Ack(queue.clone(), id.clone()));
        self.outcome(id.as_str())
    }

    async fn nack(&self, queue: &QueueName, id: &MessageId) -> Result<(), QueueError> {
        self.pass_gate().await;
        self.calls
            .lock()
            .unwrap()
            .push(Call::Nack(queue.clone(), id.clone()));
        self.outcome(id.as_str())
    }

    async fn produce(&self, message: &NewMessage, queue: &QueueName) -> Result<(), QueueError> {
        self.pass_gate().await;
        self.calls
            .lock()
            .unwrap()
            .push(Call::Produce(queue.clone(), message.content.clone()));
        self.outcome(&message.content)
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}
