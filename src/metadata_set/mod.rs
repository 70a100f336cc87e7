//! Metadata sets
//!
//! A [`MetadataSet`] is one browsable collection: it binds a source adapter
//! to a filter vocabulary and an export capability description. It is
//! built once from configuration and is read-only afterwards, so a single
//! instance can be shared (behind an `Arc`) across concurrent queries.
//!
//! Capability negotiation happens here:
//! - [`MetadataSet::available_filters`] recomputes dependent filter options
//! - [`MetadataSet::validate`] turns a [`Query`] into a [`NormalizedQuery`]
//! - [`MetadataSet::export_formats`] lists the formats of a resource type

pub mod error;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub use error::{NotFoundError, ValidationError};

use crate::adapters::SourceAdapter;
use crate::config::{ConfigError, MetadataSetConfig};
use crate::connector::ConnectorError;
use crate::models::{
    ExportFormat, FilterField, FilterKind, NormalizedQuery, Query, Record, ResourceType, Selections, SourceRef,
};
use crate::transport::{Transport, TransportError};

/// One configured, browsable collection bound to a source adapter
#[derive(Debug, Clone)]
pub struct MetadataSet {
    config: MetadataSetConfig,
    adapter: Arc<dyn SourceAdapter>,
}

impl MetadataSet {
    /// Validate the configuration and bind the configured adapter
    pub fn from_config(config: MetadataSetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let adapter = config.adapter.build(&config)?;
        Ok(Self { config, adapter })
    }

    /// Validate the configuration and bind a caller-supplied adapter
    pub fn with_adapter(
        config: MetadataSetConfig,
        adapter: Arc<dyn SourceAdapter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, adapter })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        self.config.display_name()
    }

    pub fn config(&self) -> &MetadataSetConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<dyn SourceAdapter> {
        &self.adapter
    }

    pub fn max_page_size(&self) -> u32 {
        self.config.max_page_size
    }

    /// Resource type of the records this set yields
    pub fn resource_type(&self) -> ResourceType {
        ResourceType::new(&self.config.resource_type)
    }

    /// Every resource type the set yields or declares export formats for
    pub fn resource_types(&self) -> BTreeSet<ResourceType> {
        let mut types: BTreeSet<ResourceType> = self
            .config
            .export_formats
            .keys()
            .map(|name| ResourceType::new(name))
            .collect();
        types.insert(self.resource_type());
        types
    }

    /// Field descriptors as configured, without dependency narrowing
    pub fn fields(&self) -> &[FilterField] {
        &self.config.fields
    }

    pub fn field(&self, name: &str) -> Option<&FilterField> {
        self.config.fields.iter().find(|field| field.name == name)
    }

    /// Every filter field with options narrowed to `selections`
    ///
    /// Returns a fresh snapshot; the stored descriptors are never changed,
    /// so previewing an uncommitted selection is safe.
    pub fn available_filters(&self, selections: &Selections) -> BTreeMap<String, FilterField> {
        self.config
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.recompute(selections)))
            .collect()
    }

    /// Check a query against this set's capabilities
    ///
    /// Rejects queries for another set, unknown filter or sort fields, values
    /// outside the field's current options, more than one range per field,
    /// and out-of-range paging.
    pub fn validate(&self, query: &Query) -> Result<NormalizedQuery, ValidationError> {
        if query.metadata_set_id != self.config.id {
            return Err(ValidationError::MetadataSetMismatch {
                expected: self.config.id.clone(),
                actual: query.metadata_set_id.clone(),
            });
        }

        let mut filters: Vec<(String, Vec<String>)> = Vec::new();
        for selection in &query.filters {
            if self.field(&selection.field).is_none() {
                return Err(self.unknown_field(&selection.field));
            }
            match filters.iter_mut().find(|(field, _)| *field == selection.field) {
                Some((_, values)) => {
                    if !values.contains(&selection.value) {
                        values.push(selection.value.clone());
                    }
                }
                None => filters.push((selection.field.clone(), vec![selection.value.clone()])),
            }
        }

        let selections: Selections = filters.iter().cloned().collect();
        let available = self.available_filters(&selections);
        for (name, values) in &filters {
            let Some(field) = available.get(name) else {
                return Err(self.unknown_field(name));
            };
            if let Some(value) = values.iter().find(|value| !field.accepts(value)) {
                return Err(ValidationError::InvalidOption {
                    field: name.clone(),
                    value: value.clone(),
                });
            }
            // Sources cannot OR several ranges of one field
            if field.kind == FilterKind::Range && values.len() > 1 {
                return Err(ValidationError::InvalidOption {
                    field: name.clone(),
                    value: values[1].clone(),
                });
            }
        }

        if let Some(sort) = &query.sort {
            let sortable = self.config.sort_fields.contains(&sort.field)
                || self.field(&sort.field).is_some();
            if !sortable {
                return Err(self.unknown_field(&sort.field));
            }
        }

        if query.page < 1 || query.page_size < 1 || query.page_size > self.config.max_page_size {
            return Err(ValidationError::InvalidPaging {
                page: query.page,
                page_size: query.page_size,
                max_page_size: self.config.max_page_size,
            });
        }

        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);

        Ok(NormalizedQuery::new(
            self.config.id.clone(),
            filters,
            search,
            query.page,
            query.page_size,
            query.sort.clone(),
        ))
    }

    /// Formats a resource type may be exported in; empty when undeclared
    pub fn export_formats(&self, resource_type: &ResourceType) -> BTreeSet<ExportFormat> {
        self.config
            .export_formats
            .get(resource_type.as_str())
            .map(|formats| formats.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether autocomplete is available for a field, or for full-text search when `None`
    pub fn supports_autocomplete(&self, field: Option<&str>) -> bool {
        match field {
            None => self.config.search_autocomplete,
            Some(name) => self.field(name).is_some_and(|field| field.autocomplete),
        }
    }

    /// Reference to a resource of this set by its native id
    pub fn source_ref(&self, id: impl Into<String>) -> SourceRef {
        SourceRef::new(&self.config.id, id)
    }

    /// Retrieve the full detail of a resource
    ///
    /// A 404 from the source, or a reference belonging to another set, is
    /// [`ConnectorError::NotFound`].
    pub async fn get_resource(
        &self,
        transport: &dyn Transport,
        source_ref: &SourceRef,
    ) -> Result<Record, ConnectorError> {
        if source_ref.metadata_set_id != self.config.id {
            return Err(NotFoundError::new(&self.config.id, &source_ref.native_id).into());
        }

        let request = self.adapter.build_resource_request(source_ref);
        tracing::debug!(
            metadata_set = %self.config.id,
            id = %source_ref.native_id,
            url = %request.url,
            "Fetching resource detail"
        );

        let body = match transport.request(&request).await {
            Ok(body) => body,
            Err(TransportError::HttpError { status: 404, .. }) => {
                return Err(NotFoundError::new(&self.config.id, &source_ref.native_id).into());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self.adapter.parse_resource(body)?)
    }

    fn unknown_field(&self, field: &str) -> ValidationError {
        ValidationError::UnknownField {
            metadata_set: self.config.id.clone(),
            field: field.to_string(),
        }
    }
}
