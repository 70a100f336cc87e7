//! Normalized records and pages

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource type of a record (e.g. `reference_indicator`, `data_element`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Pointer back to a record's native identity in its originating source
///
/// Opaque to callers; only the adapter that produced it interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Metadata set the record came from
    pub metadata_set_id: String,
    /// Identifier understood by the source
    pub native_id: String,
    /// Canonical URL or path of the resource in the source, when reported
    #[serde(default)]
    pub url: Option<String>,
}

impl SourceRef {
    pub fn new(metadata_set_id: impl Into<String>, native_id: impl Into<String>) -> Self {
        Self {
            metadata_set_id: metadata_set_id.into(),
            native_id: native_id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A resource in the connector's field vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub resource_type: ResourceType,
    pub id: String,
    pub display_name: String,
    /// Field name (metadata set vocabulary) to value
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub source_ref: SourceRef,
}

impl Record {
    /// Attribute value rendered as plain text (strings unquoted, null empty)
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(value_to_text)
    }
}

/// Render a JSON value as plain text for tabular output
pub fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// One page of search results
///
/// A page is a snapshot: it is never modified after construction, and a
/// new search produces a new page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    records: Vec<Record>,
    page_number: u32,
    page_size: u32,
    total_count: Option<u64>,
    has_more: bool,
}

impl Page {
    /// Build a page, deriving `has_more`
    ///
    /// With a reported total, more pages exist while `page * page_size`
    /// is below it. Without one, a full page implies there may be more.
    pub fn new(
        records: Vec<Record>,
        page_number: u32,
        page_size: u32,
        total_count: Option<u64>,
    ) -> Self {
        let has_more = match total_count {
            Some(total) => u64::from(page_number) * u64::from(page_size) < total,
            None => records.len() as u64 == u64::from(page_size),
        };
        Self {
            records,
            page_number,
            page_size,
            total_count,
            has_more,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Total matches across all pages, if the source reports it
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
