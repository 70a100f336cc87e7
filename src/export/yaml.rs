//! YAML exporter

use super::{ExportError, ExportSelection};

pub struct YamlExporter;

impl YamlExporter {
    pub fn export(selection: &ExportSelection) -> Result<String, ExportError> {
        let rendered = match selection {
            ExportSelection::Single(record) => serde_yaml::to_string(record),
            ExportSelection::Set(records) => serde_yaml::to_string(records),
        };
        rendered.map_err(|e| ExportError::GenerationFailed(format!("YAML serialization: {e}")))
    }
}
