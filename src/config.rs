//! Connector configuration
//!
//! The configuration collaborator hands the connector one record per
//! metadata set (base URL, adapter selector, source identifiers, filter
//! fields, export formats) plus transport settings. Configuration is read
//! from TOML or JSON and validated once at startup; after that it is treated
//! as read-only input.
//!
//! ```toml
//! [transport]
//! timeout_seconds = 30
//!
//! [[metadata_sets]]
//! id = "reference-indicators"
//! base_url = "https://api.staging.openconceptlab.org"
//! adapter = "ocl"
//! organization = "PEPFAR-Test7"
//! source = "MER"
//! concept_class = "Reference Indicator"
//! resource_type = "reference_indicator"
//!
//! [metadata_sets.export_formats]
//! reference_indicator = ["json", "csv"]
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::AdapterKind;
use crate::models::{ExportFormat, FilterField, FilterKind};
use crate::transport::TransportConfig;

/// Maximum length of a metadata set identifier
const MAX_ID_LENGTH: usize = 100;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid metadata set '{set}': {message}")]
    Invalid { set: String, message: String },

    #[error("Duplicate metadata set id: {0}")]
    DuplicateSet(String),

    #[error("Unsupported config file extension: {0} (expected .toml or .json)")]
    UnsupportedExtension(String),

    #[error("Invalid transport settings: {0}")]
    InvalidTransport(String),

    #[error("Failed to build transport: {0}")]
    Transport(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub metadata_sets: Vec<MetadataSetConfig>,
}

impl ConnectorConfig {
    /// Parse and validate TOML configuration
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON configuration
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config = match extension.as_str() {
            "toml" => Self::from_toml_str(&contents)?,
            "json" => Self::from_json_str(&contents)?,
            other => return Err(ConfigError::UnsupportedExtension(other.to_string())),
        };
        tracing::info!(
            path = %path.display(),
            metadata_sets = config.metadata_sets.len(),
            "Loaded connector configuration"
        );
        Ok(config)
    }

    /// Validate transport bounds, every set and the uniqueness of set ids
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transport
            .validate()
            .map_err(ConfigError::InvalidTransport)?;
        let mut seen = HashSet::new();
        for set in &self.metadata_sets {
            if !seen.insert(set.id.as_str()) {
                return Err(ConfigError::DuplicateSet(set.id.clone()));
            }
            set.validate()?;
        }
        Ok(())
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_metadata_set(mut self, set: MetadataSetConfig) -> Self {
        self.metadata_sets.push(set);
        self
    }

    /// Look up a set by id
    pub fn metadata_set(&self, id: &str) -> Option<&MetadataSetConfig> {
        self.metadata_sets.iter().find(|set| set.id == id)
    }
}

/// Configuration of one metadata set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSetConfig {
    /// Identifier used in queries (`Query.metadata_set_id`)
    pub id: String,
    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub base_url: String,
    pub adapter: AdapterKind,
    /// Source owner (OCL organization)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Source name (OCL source)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Source version; latest when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// OCL concept class every search is restricted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_class: Option<String>,
    /// Resource type of the records this set yields
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Whether the source supports full-text name suggestions
    #[serde(default)]
    pub search_autocomplete: bool,
    /// Fields queries may sort on, besides the filter fields
    #[serde(default = "default_sort_fields")]
    pub sort_fields: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FilterField>,
    /// Resource type to the formats it may be exported in
    #[serde(default)]
    pub export_formats: BTreeMap<String, Vec<ExportFormat>>,
}

fn default_resource_type() -> String {
    "concept".to_string()
}

fn default_max_page_size() -> u32 {
    100
}

fn default_sort_fields() -> Vec<String> {
    vec!["display_name".to_string()]
}

impl MetadataSetConfig {
    /// Create a set configuration with defaults
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, adapter: AdapterKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            base_url: base_url.into(),
            adapter,
            organization: None,
            source: None,
            version: None,
            concept_class: None,
            resource_type: default_resource_type(),
            max_page_size: default_max_page_size(),
            search_autocomplete: false,
            sort_fields: default_sort_fields(),
            fields: Vec::new(),
            export_formats: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_concept_class(mut self, concept_class: impl Into<String>) -> Self {
        self.concept_class = Some(concept_class.into());
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn with_search_autocomplete(mut self, enabled: bool) -> Self {
        self.search_autocomplete = enabled;
        self
    }

    pub fn with_sort_field(mut self, field: impl Into<String>) -> Self {
        self.sort_fields.push(field.into());
        self
    }

    pub fn with_field(mut self, field: FilterField) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare the export formats of a resource type
    pub fn with_export_formats<I>(mut self, resource_type: impl Into<String>, formats: I) -> Self
    where
        I: IntoIterator<Item = ExportFormat>,
    {
        self.export_formats
            .insert(resource_type.into(), formats.into_iter().collect());
        self
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Validate identifiers, URL and the filter dependency graph
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_set_id(&self.id)?;

        let base_url = self.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(self.invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.resource_type.trim().is_empty() {
            return Err(self.invalid("resource_type must not be empty"));
        }
        if self.max_page_size == 0 {
            return Err(self.invalid("max_page_size must be at least 1"));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(self.invalid("filter field with empty name"));
            }
            if !names.insert(field.name.as_str()) {
                return Err(self.invalid(format!("duplicate filter field '{}'", field.name)));
            }
            if field.kind == FilterKind::Range {
                match field.range {
                    Some(bounds) if bounds.min <= bounds.max => {}
                    Some(_) => {
                        return Err(self.invalid(format!(
                            "range field '{}' has min greater than max",
                            field.name
                        )));
                    }
                    None => {
                        return Err(self.invalid(format!(
                            "range field '{}' needs bounds",
                            field.name
                        )));
                    }
                }
            }
        }

        for field in &self.fields {
            for dependency in &field.depends_on {
                if dependency == &field.name {
                    return Err(self.invalid(format!("field '{}' depends on itself", field.name)));
                }
                if !names.contains(dependency.as_str()) {
                    return Err(self.invalid(format!(
                        "field '{}' depends on unknown field '{dependency}'",
                        field.name
                    )));
                }
            }
            for option in &field.options {
                if let Some(key) = option
                    .requires
                    .keys()
                    .find(|key| !field.depends_on.contains(key))
                {
                    return Err(self.invalid(format!(
                        "option '{}' of field '{}' requires '{key}', which is not in depends_on",
                        option.value, field.name
                    )));
                }
            }
        }

        self.check_dependency_cycles()
    }

    fn check_dependency_cycles(&self) -> Result<(), ConfigError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut nodes = HashMap::new();
        for field in &self.fields {
            nodes.insert(field.name.as_str(), graph.add_node(field.name.as_str()));
        }
        for field in &self.fields {
            for dependency in &field.depends_on {
                if let (Some(&from), Some(&to)) =
                    (nodes.get(dependency.as_str()), nodes.get(field.name.as_str()))
                {
                    graph.add_edge(from, to, ());
                }
            }
        }
        toposort(&graph, None).map(|_| ()).map_err(|cycle| {
            self.invalid(format!(
                "filter dependency cycle through '{}'",
                graph[cycle.node_id()]
            ))
        })
    }

    fn invalid(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            set: self.id.clone(),
            message: message.into(),
        }
    }
}

/// Validate a metadata set identifier
///
/// Ids appear in URLs, file names and logs, so only alphanumerics,
/// hyphens, underscores and periods are allowed.
fn validate_set_id(id: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::Invalid {
        set: id.to_string(),
        message: message.to_string(),
    };

    if id.is_empty() {
        return Err(invalid("id cannot be empty"));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(invalid("id too long (max 100 characters)"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(invalid(
            "id contains invalid characters. Only alphanumeric, hyphens, underscores and periods are allowed.",
        ));
    }
    if id.starts_with('.') {
        return Err(invalid("id cannot start with a period"));
    }
    Ok(())
}
