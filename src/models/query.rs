//! Query model
//!
//! A [`Query`] is what callers build; a [`NormalizedQuery`] is what a
//! metadata set hands to its source adapter after validation. The only way
//! to obtain a `NormalizedQuery` is [`MetadataSet::validate`](crate::metadata_set::MetadataSet::validate).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::SortDirection;

/// Current filter selections: field name to selected values, in selection order
pub type Selections = BTreeMap<String, Vec<String>>;

/// Default page size when none is given
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// One `(field, value)` filter selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub field: String,
    pub value: String,
}

impl FilterSelection {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// A search request against one metadata set
///
/// # Example
///
/// ```rust
/// use metadata_connector::models::{Query, SortDirection};
///
/// let query = Query::new("reference-indicators")
///     .with_filter("indicator_group", "Treatment")
///     .with_search("TX_")
///     .with_page(1)
///     .with_page_size(10)
///     .with_sort("display_name", SortDirection::Asc);
///
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub metadata_set_id: String,
    /// Ordered filter selections
    #[serde(default)]
    pub filters: Vec<FilterSelection>,
    /// Free-text search term
    #[serde(default)]
    pub search: Option<String>,
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Query {
    /// Create a query for the first page of a metadata set
    pub fn new(metadata_set_id: impl Into<String>) -> Self {
        Self {
            metadata_set_id: metadata_set_id.into(),
            filters: Vec::new(),
            search: None,
            page: default_page(),
            page_size: default_page_size(),
            sort: None,
        }
    }

    /// Add a filter selection
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(FilterSelection::new(field, value));
        self
    }

    /// Set the free-text search term
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Set the 1-based page number
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the sort order
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec::new(field, direction));
        self
    }

    /// Selections grouped by field, keeping value order and dropping duplicates
    pub fn selections(&self) -> Selections {
        let mut selections = Selections::new();
        for selection in &self.filters {
            let values = selections.entry(selection.field.clone()).or_default();
            if !values.contains(&selection.value) {
                values.push(selection.value.clone());
            }
        }
        selections
    }
}

/// A query that passed validation against its metadata set
///
/// Filters are grouped per field in first-selection order; values of the
/// same field are alternatives, different fields all apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedQuery {
    metadata_set_id: String,
    filters: Vec<(String, Vec<String>)>,
    search: Option<String>,
    page: u32,
    page_size: u32,
    sort: Option<SortSpec>,
}

impl NormalizedQuery {
    pub(crate) fn new(
        metadata_set_id: String,
        filters: Vec<(String, Vec<String>)>,
        search: Option<String>,
        page: u32,
        page_size: u32,
        sort: Option<SortSpec>,
    ) -> Self {
        Self {
            metadata_set_id,
            filters,
            search,
            page,
            page_size,
            sort,
        }
    }

    pub fn metadata_set_id(&self) -> &str {
        &self.metadata_set_id
    }

    /// Filters grouped by field
    pub fn filters(&self) -> &[(String, Vec<String>)] {
        &self.filters
    }

    /// Selected values for one field
    pub fn values_for(&self, field: &str) -> Option<&[String]> {
        self.filters
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, values)| values.as_slice())
    }

    /// Trimmed, non-empty search term
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Zero-based index of the first record on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }
}
