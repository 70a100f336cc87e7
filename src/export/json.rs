//! JSON exporter

use super::{ExportError, ExportSelection};

/// Exporter for pretty-printed JSON
pub struct JsonExporter;

impl JsonExporter {
    /// A single record becomes an object, a set becomes an array
    pub fn export(selection: &ExportSelection) -> Result<String, ExportError> {
        let rendered = match selection {
            ExportSelection::Single(record) => serde_json::to_string_pretty(record),
            ExportSelection::Set(records) => serde_json::to_string_pretty(records),
        };
        rendered.map_err(|e| ExportError::GenerationFailed(format!("JSON serialization: {e}")))
    }
}
