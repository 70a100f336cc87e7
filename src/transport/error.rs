//! Error types for transport operations
//!
//! Every failure of a network call is classified into one of four kinds so
//! callers can branch on it: no response at all, a non-2xx response, a body
//! that is not JSON, or a collection that came back empty.

use thiserror::Error;

/// Maximum number of response body characters kept in [`TransportError::HttpError`]
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 2048;

/// Errors that can occur while talking to an external metadata source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response was received (connection refused/reset, DNS, timeout)
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// The request exceeded the configured timeout
        timed_out: bool,
    },

    /// A response was received but its status was not 2xx
    #[error("HTTP error {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body is not valid JSON, or a record is malformed
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The response parsed but the expected collection is empty or missing
    #[error("Source returned no data: {0}")]
    Empty(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// Build a network error for a request that never got a response
    pub fn network(message: impl Into<String>) -> Self {
        TransportError::Network {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Build a network error for a request that hit its timeout
    pub fn timeout(seconds: u64) -> Self {
        TransportError::Network {
            message: format!("request timed out after {seconds} seconds"),
            timed_out: true,
        }
    }

    /// Build an HTTP error, truncating very large bodies
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            truncated.push_str("...");
            truncated
        } else {
            body
        };
        TransportError::HttpError { status, body }
    }

    /// Check if this error is transient and an idempotent request may be retried
    ///
    /// Transient failures are missing responses (connection reset, timeout)
    /// and gateway errors (502, 503, 504).
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network { .. } => true,
            TransportError::HttpError { status, .. } => matches!(status, 502..=504),
            TransportError::Decode(_) | TransportError::Empty(_) => false,
        }
    }

    /// HTTP status code, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short name of the error kind, used for structured logging
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Network { .. } => "network",
            TransportError::HttpError { .. } => "http",
            TransportError::Decode(_) => "decode",
            TransportError::Empty(_) => "empty",
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}
