//! Metadata Connector - one client interface over heterogeneous metadata catalogs
//!
//! Provides unified interfaces for:
//! - HTTP JSON transport with timeouts, retries and typed failures
//! - Source adapters translating queries and records per source dialect (OCL, DHIS2)
//! - Metadata sets describing filters, dependent options and export formats
//! - A cancellable connector façade for search, autocomplete and detail retrieval
//! - Export of records to JSON, CSV, YAML and Markdown

pub mod adapters;
pub mod config;
pub mod connector;
pub mod export;
pub mod metadata_set;
pub mod models;
pub mod transport;

pub mod cli;

// Re-export commonly used types
pub use adapters::{AdapterKind, Dhis2Adapter, OclAdapter, SourceAdapter};
pub use config::{ConfigError, ConnectorConfig, MetadataSetConfig};
pub use connector::{CancellationToken, Connector, ConnectorError, ConnectorRegistry, SearchHandle};
pub use export::{
    ExportArtifact, ExportEngine, ExportError, ExportJob, ExportSelection, ExportState,
};
pub use metadata_set::{MetadataSet, NotFoundError, ValidationError};
pub use transport::{
    HttpMethod, ScriptedTransport, Transport, TransportConfig, TransportError, TransportRequest,
};
#[cfg(feature = "http-transport")]
pub use transport::HttpTransport;

// Re-export models
pub use models::enums::*;
pub use models::{
    FilterField, FilterOption, FilterSelection, NormalizedQuery, Page, Query, Record,
    ResourceType, Selections, SortSpec, SourceRef,
};
