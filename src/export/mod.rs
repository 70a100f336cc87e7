//! Export functionality
//!
//! Produces downloadable artifacts from a single record or a set of records.
//! The connector checks the requested format against the metadata set's
//! declared export formats before a job is created; the [`ExportEngine`]
//! then drives the job through `pending -> generating -> ready | failed`.
//!
//! Renderers:
//! - JSON (pretty object or array)
//! - CSV (RFC 4180)
//! - YAML
//! - Markdown table

pub mod csv;
pub mod engine;
pub mod job;
pub mod json;
pub mod markdown;
pub mod yaml;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::connector::ConnectorError;
use crate::models::record::value_to_text;
use crate::models::{ExportFormat, Record, ResourceType};

pub use csv::CsvExporter;
pub use engine::{ExportEngine, RecordResolver};
pub use job::{ExportJob, ExportState};
pub use json::JsonExporter;
pub use markdown::MarkdownExporter;
pub use yaml::YamlExporter;

/// Error during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Format '{format}' is not available for resource type '{resource_type}'")]
    UnsupportedFormat {
        format: ExportFormat,
        resource_type: String,
    },

    #[error("Export generation failed: {0}")]
    GenerationFailed(String),

    #[error("Cannot export mixed resource types in one set: {}", .0.join(", "))]
    MixedResourceTypes(Vec<String>),

    /// Generation failed while resolving a record's full detail; keeps the
    /// record id and the underlying connector error
    #[error("Failed to fetch '{id}' for export: {source}")]
    Fetch {
        id: String,
        #[source]
        source: ConnectorError,
    },

    #[error("Nothing selected for export")]
    EmptySelection,

    #[error("Export job cannot move from {from} to {to}")]
    InvalidTransition { from: ExportState, to: ExportState },

    #[error("Export canceled")]
    Canceled,
}

impl ExportError {
    /// Whether the job failed while assembling the artifact, either
    /// rendering or resolving record detail
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            ExportError::GenerationFailed(_) | ExportError::Fetch { .. }
        )
    }
}

/// What to export: one resource or a set of resources
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExportSelection {
    Single(Record),
    Set(Vec<Record>),
}

impl ExportSelection {
    pub fn records(&self) -> &[Record] {
        match self {
            ExportSelection::Single(record) => std::slice::from_ref(record),
            ExportSelection::Set(records) => records,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, ExportSelection::Single(_))
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Distinct resource types in the selection
    pub fn resource_types(&self) -> BTreeSet<ResourceType> {
        self.records()
            .iter()
            .map(|record| record.resource_type.clone())
            .collect()
    }
}

impl From<Record> for ExportSelection {
    fn from(record: Record) -> Self {
        ExportSelection::Single(record)
    }
}

impl From<Vec<Record>> for ExportSelection {
    fn from(records: Vec<Record>) -> Self {
        ExportSelection::Set(records)
    }
}

/// A generated export, handed to the download collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportArtifact {
    /// Id of the job that produced the artifact
    pub job_id: Uuid,
    pub format: ExportFormat,
    pub mime_type: String,
    /// Suggested download file name
    pub file_name: String,
    pub payload: Vec<u8>,
    pub record_count: usize,
    pub generated_at: DateTime<Utc>,
    /// Hex SHA-256 of the payload
    pub checksum: String,
}

impl ExportArtifact {
    /// Payload as UTF-8 text (every supported format is textual)
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Render records in `format`
pub fn render(format: ExportFormat, selection: &ExportSelection) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => JsonExporter::export(selection),
        ExportFormat::Csv => Ok(CsvExporter::export(selection.records())),
        ExportFormat::Yaml => YamlExporter::export(selection),
        ExportFormat::Markdown => Ok(MarkdownExporter::export(selection.records())),
    }
}

/// Tabular columns: identity columns, then every attribute name in order
pub(crate) fn columns(records: &[Record]) -> Vec<String> {
    let mut attributes = BTreeSet::new();
    for record in records {
        attributes.extend(record.attributes.keys().cloned());
    }
    ["id", "display_name", "resource_type"]
        .into_iter()
        .map(str::to_string)
        .chain(attributes)
        .collect()
}

/// Text of one tabular cell
pub(crate) fn cell(record: &Record, column: &str) -> String {
    match column {
        "id" => record.id.clone(),
        "display_name" => record.display_name.clone(),
        "resource_type" => record.resource_type.to_string(),
        other => record
            .attributes
            .get(other)
            .map(value_to_text)
            .unwrap_or_default(),
    }
}
