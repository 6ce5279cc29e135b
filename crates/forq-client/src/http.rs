//! HTTP transport for the queue server REST API.
//!
//! Every call is a single request; nothing is retried. The transport is also
//! the synchronous API of this crate: applications that do not need the
//! background workers can call it directly.
//!
//! ## Endpoints
//!
//! - `GET  /api/v1/queues/{queue}/messages`: consume one (200 message, 204 empty)
//! - `POST /api/v1/queues/{queue}/messages`: produce (204)
//! - `POST /api/v1/queues/{queue}/messages/{id}/ack`: acknowledge (204)
//! - `POST /api/v1/queues/{queue}/messages/{id}/nack`: reject (204)
//!
//! Any other status carries a JSON `{code}` body, surfaced as
//! [`QueueError::Api`].
//!
//! ## Example
//!
//! ```no_run
//! use forq_client::{ClientConfig, HttpTransport, NewMessage, QueueName, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("http://localhost:8080", "secret");
//! let transport = HttpTransport::new(config)?;
//!
//! let queue = QueueName::new("orders");
//! transport.produce(&NewMessage::new("hello"), &queue).await?;
//!
//! if let Some(message) = transport.consume_one(&queue).await? {
//!     transport.ack(&queue, message.id()).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::error::{ConfigurationError, ErrorResponse, QueueError};
use crate::message::{Message, MessageId, NewMessage, QueueName};
use crate::transport::{ensure_long_poll_timeout, Transport};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

/// Header carrying the shared secret (`X-API-Key`)
pub const API_KEY_HEADER: &str = "x-api-key";

/// HTTP implementation of [`Transport`]
#[derive(Clone)]
pub struct HttpTransport {
    http_client: HttpClient,
    base_url: String,
    request_timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport for producing.
    ///
    /// The request timeout is not checked against the long-poll bound; use
    /// [`HttpTransport::consumer`] when the transport will consume.
    pub fn new(config: ClientConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let base_url = config.normalized_server_url()?;
        let request_timeout = config.request_timeout();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut api_key = HeaderValue::from_str(&config.auth_secret).map_err(|_| {
            ConfigurationError::Invalid {
                message: "auth_secret contains characters not allowed in a header".to_string(),
            }
        })?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        let mut builder = HttpClient::builder().default_headers(headers);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| QueueError::Request {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            http_client,
            base_url,
            request_timeout,
        })
    }

    /// Create a transport for consuming.
    ///
    /// Fails before any request is made if the request timeout could cut a
    /// long poll short.
    pub fn consumer(config: ClientConfig) -> Result<Self, QueueError> {
        ensure_long_poll_timeout(config.request_timeout())?;
        Self::new(config)
    }

    /// Base URL requests are made against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn messages_url(&self, queue: &QueueName) -> String {
        format!(
            "{}/api/v1/queues/{}/messages",
            self.base_url,
            urlencoding::encode(queue.as_str())
        )
    }

    fn message_action_url(&self, queue: &QueueName, id: &MessageId, action: &str) -> String {
        format!(
            "{}/{}/{}",
            self.messages_url(queue),
            urlencoding::encode(id.as_str()),
            action
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, QueueError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                QueueError::Request {
                    message: format!("Request timeout: {}", e),
                }
            } else if e.is_connect() {
                QueueError::Request {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                QueueError::Request {
                    message: format!("HTTP request failed: {}", e),
                }
            }
        })
    }

    /// Shared handling for calls whose only success is `204 No Content`
    async fn expect_no_content(&self, request: RequestBuilder) -> Result<(), QueueError> {
        let response = self.send(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        Err(error_from_response(response).await)
    }
}

/// Decode the `{code}` body of an unsuccessful response
async fn error_from_response(response: Response) -> QueueError {
    let status = response.status().as_u16();
    match response.json::<ErrorResponse>().await {
        Ok(body) => body.into_queue_error(status),
        Err(e) => QueueError::InvalidResponse {
            message: format!("Failed to decode error response ({}): {}", status, e),
        },
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn consume_one(&self, queue: &QueueName) -> Result<Option<Message>, QueueError> {
        let url = self.messages_url(queue);
        trace!(queue = %queue, "Polling for message");

        let response = self.send(self.http_client.get(&url)).await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                trace!(queue = %queue, "No message available");
                Ok(None)
            }
            StatusCode::OK => {
                let message = response.json::<Message>().await.map_err(|e| {
                    QueueError::InvalidResponse {
                        message: format!("Failed to decode message response: {}", e),
                    }
                })?;
                debug!(queue = %queue, message_id = %message.id, "Received message");
                Ok(Some(message))
            }
            _ => Err(error_from_response(response).await),
        }
    }

    async fn ack(&self, queue: &QueueName, id: &MessageId) -> Result<(), QueueError> {
        let url = self.message_action_url(queue, id, "ack");
        self.expect_no_content(self.http_client.request(Method::POST, &url))
            .await?;
        debug!(queue = %queue, message_id = %id, "Message acknowledged");
        Ok(())
    }

    async fn nack(&self, queue: &QueueName, id: &MessageId) -> Result<(), QueueError> {
        let url = self.message_action_url(queue, id, "nack");
        self.expect_no_content(self.http_client.request(Method::POST, &url))
            .await?;
        debug!(queue = %queue, message_id = %id, "Message rejected");
        Ok(())
    }

    async fn produce(&self, message: &NewMessage, queue: &QueueName) -> Result<(), QueueError> {
        let url = self.messages_url(queue);
        // .json() also sets Content-Type: application/json
        self.expect_no_content(self.http_client.post(&url).json(message))
            .await?;
        debug!(
            queue = %queue,
            delayed = message.process_after.is_some(),
            "Message produced"
        );
        Ok(())
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}
