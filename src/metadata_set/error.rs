//! Error types for metadata set operations

use thiserror::Error;

/// A query rejected before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The field is not declared by the metadata set
    #[error("Unknown field '{field}' for metadata set '{metadata_set}'")]
    UnknownField { metadata_set: String, field: String },

    /// The value is not among the field's currently valid options
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidOption { field: String, value: String },

    /// Page must be at least 1 and page size within [1, max_page_size]
    #[error("Invalid paging: page {page}, page size {page_size} (page size must be 1..={max_page_size})")]
    InvalidPaging {
        page: u32,
        page_size: u32,
        max_page_size: u32,
    },

    /// The query targets another metadata set
    #[error("Query for metadata set '{actual}' sent to '{expected}'")]
    MetadataSetMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Field the error is about, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::UnknownField { field, .. }
            | ValidationError::InvalidOption { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// A resource the source does not know
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Resource '{id}' not found in metadata set '{metadata_set}'")]
pub struct NotFoundError {
    pub metadata_set: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(metadata_set: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            metadata_set: metadata_set.into(),
            id: id.into(),
        }
    }
}
