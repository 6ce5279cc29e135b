//! Error types for queue operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Comprehensive error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Request failed: {message}")]
    Request { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Server rejected request ({status}): {code}")]
    Api { status: u16, code: ErrorCode },

    #[error("{component} has already been started")]
    AlreadyStarted { component: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl QueueError {
    /// Check if error is transient and the same request may succeed later.
    ///
    /// This is a classification only. Nothing in this crate retries.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } => true,
            Self::InvalidResponse { .. } => false,
            Self::Api { status, code } => *status >= 500 || *code == ErrorCode::Internal,
            Self::AlreadyStarted { .. } => false,
            Self::Configuration(_) => false,
        }
    }

    /// Server error code, if the server reported one
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Configuration errors, raised while building clients and workers
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "Request timeout {timeout:?} is shorter than the long-poll bound; \
         use no timeout or at least {minimum:?}"
    )]
    TimeoutTooShort { timeout: Duration, minimum: Duration },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

// ============================================================================
// Server Error Codes
// ============================================================================

/// Error code reported by the server in the body of a failed request.
///
/// Codes use dotted namespaces. Unknown codes are preserved verbatim so
/// newer servers do not break older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ContentExceedsLimit,
    ProcessAfterInPast,
    ProcessAfterTooFar,
    InvalidBody,
    DlqOnlyOperation,
    Unauthorized,
    MessageNotFound,
    Internal,
    Other(String),
}

impl ErrorCode {
    /// Get the wire representation of the code
    pub fn as_str(&self) -> &str {
        match self {
            Self::ContentExceedsLimit => "bad_request.body.content.exceeds_limit",
            Self::ProcessAfterInPast => "bad_request.body.processAfter.in_past",
            Self::ProcessAfterTooFar => "bad_request.body.processAfter.too_far",
            Self::InvalidBody => "bad_request.body.invalid",
            Self::DlqOnlyOperation => "bad_request.dlq_only_operation",
            Self::Unauthorized => "unauthorized",
            Self::MessageNotFound => "not_found.message",
            Self::Internal => "internal",
            Self::Other(code) => code,
        }
    }

    /// Check if the code belongs to the `bad_request` namespace
    pub fn is_bad_request(&self) -> bool {
        self.as_str().starts_with("bad_request")
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "bad_request.body.content.exceeds_limit" => Self::ContentExceedsLimit,
            "bad_request.body.processAfter.in_past" => Self::ProcessAfterInPast,
            "bad_request.body.processAfter.too_far" => Self::ProcessAfterTooFar,
            "bad_request.body.invalid" => Self::InvalidBody,
            "bad_request.dlq_only_operation" => Self::DlqOnlyOperation,
            "unauthorized" => Self::Unauthorized,
            "not_found.message" => Self::MessageNotFound,
            "internal" => Self::Internal,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by the server for any unsuccessful request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
}

impl ErrorResponse {
    /// Convert the decoded body into a typed error
    pub fn into_queue_error(self, status: u16) -> QueueError {
        QueueError::Api {
            status,
            code: ErrorCode::from(self.code.as_str()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
