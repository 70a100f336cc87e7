//! Connector error type

use thiserror::Error;

use crate::metadata_set::{NotFoundError, ValidationError};
use crate::transport::TransportError;

/// Errors surfaced by connector calls
///
/// Every failure is a typed outcome; nothing is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// The query was rejected before any network call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The source could not be reached or answered badly
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The call was canceled before it completed
    #[error("Operation canceled")]
    Canceled,

    #[error("Unknown metadata set: {0}")]
    UnknownMetadataSet(String),
}

impl ConnectorError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, ConnectorError::Canceled)
    }

    /// Underlying transport error, if any
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            ConnectorError::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Short machine-readable kind, for logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorError::Validation(_) => "validation",
            ConnectorError::Transport(e) => e.kind(),
            ConnectorError::NotFound(_) => "not_found",
            ConnectorError::Canceled => "canceled",
            ConnectorError::UnknownMetadataSet(_) => "unknown_metadata_set",
        }
    }
}
