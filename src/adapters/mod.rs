//! Source adapters
//!
//! One adapter per external metadata source. An adapter translates a
//! [`NormalizedQuery`] into the source's own URL and parameter dialect, and
//! the source's raw JSON back into normalized [`Record`]s and [`Page`]s.
//! Adapters are pure translators: they never perform I/O themselves, the
//! metadata set and connector hand their requests to a [`Transport`](crate::transport::Transport).
//!
//! Supported sources:
//! - [`OclAdapter`]: Open Concept Lab concept catalogs (reference indicators, data elements)
//! - [`Dhis2Adapter`]: DHIS2 metadata API data-element catalog

pub mod dhis2;
pub mod ocl;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ConfigError, MetadataSetConfig};
use crate::models::{FilterField, NormalizedQuery, Page, Record, SourceRef};
use crate::transport::{TransportError, TransportRequest, TransportResult};

pub use dhis2::Dhis2Adapter;
pub use ocl::OclAdapter;

/// Number of suggestions requested for full-text autocomplete
pub const AUTOCOMPLETE_LIMIT: u32 = 10;

/// Which adapter a metadata set is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Ocl,
    Dhis2,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Ocl => "ocl",
            AdapterKind::Dhis2 => "dhis2",
        }
    }

    /// Build the adapter for a metadata set configuration
    pub fn build(&self, config: &MetadataSetConfig) -> Result<Arc<dyn SourceAdapter>, ConfigError> {
        Ok(match self {
            AdapterKind::Ocl => Arc::new(OclAdapter::from_config(config)?),
            AdapterKind::Dhis2 => Arc::new(Dhis2Adapter::from_config(config)?),
        })
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ocl" => Ok(AdapterKind::Ocl),
            "dhis2" => Ok(AdapterKind::Dhis2),
            other => Err(format!("Unknown adapter: {other}")),
        }
    }
}

/// Translation layer between the normalized model and one source dialect
///
/// New sources are added by implementing this trait; shared code never
/// branches on source identity.
pub trait SourceAdapter: Send + Sync + fmt::Debug {
    /// Which source dialect this adapter speaks
    fn kind(&self) -> AdapterKind;

    /// Map a validated query into the source's search request
    fn build_query(&self, query: &NormalizedQuery) -> TransportRequest;

    /// Map a search response body into a page
    ///
    /// A missing, non-array or zero-length collection is [`TransportError::Empty`].
    fn parse_response(&self, body: Value, query: &NormalizedQuery) -> TransportResult<Page>;

    /// Map one raw source object into a record
    ///
    /// Malformed objects (not an object, no identifier) are [`TransportError::Decode`].
    fn parse_record(&self, raw: &Value) -> TransportResult<Record>;

    /// Request for the full detail of one resource
    fn build_resource_request(&self, source_ref: &SourceRef) -> TransportRequest;

    /// Map a detail response body into a record
    fn parse_resource(&self, body: Value) -> TransportResult<Record> {
        self.parse_record(&body)
    }

    /// Request for full-text name suggestions
    fn build_autocomplete(&self, term: &str, limit: u32) -> TransportRequest;

    /// Map an autocomplete response body into display names
    ///
    /// No matches is an empty list, not an error.
    fn parse_autocomplete(&self, body: Value) -> TransportResult<Vec<String>>;
}

/// How one vocabulary field maps onto a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Field name in the metadata set's vocabulary
    pub name: String,
    /// Query parameter or property used to filter and sort on the field
    pub param: String,
    /// Dotted path of the value in the source's JSON
    pub path: String,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, param: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
            path: path.into(),
        }
    }
}

/// Resolve the mapping of every configured field
///
/// A field's `source_name` wins; otherwise the adapter's built-in
/// vocabulary is consulted, then `fallback` names the field.
pub(crate) fn resolve_mappings(
    fields: &[FilterField],
    builtin: &[(&str, &str, &str)],
    fallback: impl Fn(&str) -> String,
) -> Vec<FieldMapping> {
    fields
        .iter()
        .map(|field| match &field.source_name {
            Some(source_name) => FieldMapping::new(&field.name, source_name, source_name),
            None => builtin_mapping(builtin, &field.name)
                .unwrap_or_else(|| {
                    let native = fallback(&field.name);
                    FieldMapping::new(&field.name, &native, &native)
                }),
        })
        .collect()
}

pub(crate) fn builtin_mapping(builtin: &[(&str, &str, &str)], name: &str) -> Option<FieldMapping> {
    builtin
        .iter()
        .find(|(field, _, _)| *field == name)
        .map(|(field, param, path)| FieldMapping::new(*field, *param, *path))
}

/// Look up a dotted path, mapping across arrays
///
/// `dataElementGroups.id` on `{"dataElementGroups": [{"id": "a"}, {"id": "b"}]}`
/// yields `["a", "b"]`. Nulls count as absent.
pub fn lookup_path(value: &Value, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    lookup_segments(value, &segments).filter(|found| !found.is_null())
}

fn lookup_segments(value: &Value, segments: &[&str]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Object(map) => map.get(*head).and_then(|next| lookup_segments(next, rest)),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| lookup_segments(item, segments))
                .filter(|found| !found.is_null())
                .collect(),
        )),
        _ => None,
    }
}

/// The non-empty collection a search response must carry
///
/// `key` selects a member of an object body; `None` expects a bare array.
pub(crate) fn require_collection<'a>(
    body: &'a Value,
    key: Option<&str>,
    source: &str,
) -> TransportResult<&'a Vec<Value>> {
    let collection = match key {
        Some(key) => body.get(key),
        None => Some(body),
    };
    match collection.and_then(Value::as_array) {
        Some(items) if !items.is_empty() => Ok(items),
        Some(_) => Err(TransportError::Empty(format!("{source} returned an empty collection"))),
        None => Err(TransportError::Empty(format!(
            "{source} response has no {} collection",
            key.unwrap_or("top-level")
        ))),
    }
}

/// A required identifier member, as text
pub(crate) fn required_id(raw: &Value, key: &str, source: &str) -> TransportResult<String> {
    if !raw.is_object() {
        return Err(TransportError::Decode(format!(
            "{source} record is not an object"
        )));
    }
    match raw.get(key) {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(TransportError::Decode(format!(
            "{source} record is missing '{key}'"
        ))),
    }
}

/// First non-empty string member among `keys`
pub(crate) fn first_str(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(*key).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}
