//! Open Concept Lab adapter
//!
//! Concepts live under `{base}/orgs/{org}/sources/{source}[/{version}]/concepts/`.
//! Search responses are bare JSON arrays with no total, so pages report
//! `total_count = None` and derive `has_more` from the page being full.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{
    builtin_mapping, first_str, lookup_path, require_collection, required_id, resolve_mappings,
    AdapterKind, FieldMapping, SourceAdapter,
};
use crate::config::{ConfigError, MetadataSetConfig};
use crate::models::filter::parse_bool;
use crate::models::{FilterKind, NormalizedQuery, Page, Record, ResourceType, SortDirection, SourceRef};
use crate::transport::{TransportError, TransportRequest, TransportResult};

const SOURCE: &str = "OCL";
const CONCEPT_CLASS_PARAM: &str = "conceptClass";

/// Vocabulary fields OCL understands natively: (field, query param, JSON path)
const BUILTIN_FIELDS: &[(&str, &str, &str)] = &[
    ("id", "id", "id"),
    ("display_name", "name", "display_name"),
    ("concept_class", "conceptClass", "concept_class"),
    ("datatype", "datatype", "datatype"),
    ("owner", "owner", "owner"),
    ("retired", "retired", "retired"),
    ("updated_on", "lastUpdate", "updated_on"),
];

/// Attributes every OCL record carries when the concept reports them
const STANDARD_ATTRIBUTES: &[(&str, &str)] = &[
    ("concept_class", "concept_class"),
    ("datatype", "datatype"),
    ("owner", "owner"),
    ("retired", "retired"),
    ("updated_on", "updated_on"),
];

/// Adapter for an OCL source's concept catalog
#[derive(Debug, Clone)]
pub struct OclAdapter {
    metadata_set_id: String,
    concepts_url: String,
    concept_class: Option<String>,
    resource_type: ResourceType,
    fields: BTreeMap<String, (FilterKind, FieldMapping)>,
}

impl OclAdapter {
    /// Build from a metadata set configuration
    ///
    /// Requires `organization` and `source`; `version` is optional. OCL has
    /// no range syntax, so range fields are rejected.
    pub fn from_config(config: &MetadataSetConfig) -> Result<Self, ConfigError> {
        let organization = required_identifier(config, "organization", config.organization.as_deref())?;
        let source = required_identifier(config, "source", config.source.as_deref())?;
        if let Some(field) = config.fields.iter().find(|f| f.kind == FilterKind::Range) {
            return Err(ConfigError::Invalid {
                set: config.id.clone(),
                message: format!("OCL cannot filter on range field '{}'", field.name),
            });
        }

        let mut concepts_url = format!(
            "{}/orgs/{}/sources/{}/",
            config.base_url.trim_end_matches('/'),
            urlencoding::encode(organization),
            urlencoding::encode(source)
        );
        if let Some(version) = config.version.as_deref().filter(|v| !v.trim().is_empty()) {
            concepts_url.push_str(&urlencoding::encode(version));
            concepts_url.push('/');
        }
        concepts_url.push_str("concepts/");

        let mappings = resolve_mappings(&config.fields, BUILTIN_FIELDS, |name| {
            format!("extras.{name}")
        });
        let fields = config
            .fields
            .iter()
            .zip(mappings)
            .map(|(field, mapping)| (field.name.clone(), (field.kind, mapping)))
            .collect();

        Ok(Self {
            metadata_set_id: config.id.clone(),
            concepts_url,
            concept_class: config.concept_class.clone(),
            resource_type: ResourceType::new(&config.resource_type),
            fields,
        })
    }

    /// Base URL of the concept collection
    pub fn concepts_url(&self) -> &str {
        &self.concepts_url
    }

    fn param_for(&self, field: &str) -> String {
        self.fields
            .get(field)
            .map(|(_, mapping)| mapping.param.clone())
            .or_else(|| builtin_mapping(BUILTIN_FIELDS, field).map(|m| m.param))
            .unwrap_or_else(|| field.to_string())
    }

    fn with_concept_class(&self, request: TransportRequest) -> TransportRequest {
        match &self.concept_class {
            Some(class) => request.with_param(CONCEPT_CLASS_PARAM, quoted(class)),
            None => request,
        }
    }

    /// Parameter value for one field's selected values, `None` when the
    /// selection does not restrict anything
    fn filter_value(&self, field: &str, param: &str, values: &[String]) -> Option<String> {
        let kind = self.fields.get(field).map(|(kind, _)| *kind);
        if kind == Some(FilterKind::Boolean) {
            let mut selected: Vec<bool> = values.iter().filter_map(|v| parse_bool(v)).collect();
            selected.dedup();
            return match selected.as_slice() {
                [only] => Some(only.to_string()),
                _ => None,
            };
        }
        if param == CONCEPT_CLASS_PARAM {
            return Some(values.iter().map(|v| quoted(v)).collect::<Vec<_>>().join(","));
        }
        Some(values.join(","))
    }
}

/// Concept class names contain spaces; OCL matches them quoted
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.trim_matches('"'))
}

fn required_identifier<'a>(
    config: &MetadataSetConfig,
    name: &str,
    value: Option<&'a str>,
) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Invalid {
            set: config.id.clone(),
            message: format!("OCL metadata sets require '{name}'"),
        })
}

impl SourceAdapter for OclAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Ocl
    }

    fn build_query(&self, query: &NormalizedQuery) -> TransportRequest {
        let mut request = TransportRequest::get(&self.concepts_url).with_param("verbose", "true");

        let filters_class = query
            .filters()
            .iter()
            .any(|(field, _)| self.param_for(field) == CONCEPT_CLASS_PARAM);
        if !filters_class {
            request = self.with_concept_class(request);
        }

        for (field, values) in query.filters() {
            let param = self.param_for(field);
            if let Some(value) = self.filter_value(field, &param, values) {
                request = request.with_param(param, value);
            }
        }

        if let Some(term) = query.search() {
            request = request.with_param("q", term);
        }

        if let Some(sort) = query.sort() {
            let name = match sort.direction {
                SortDirection::Asc => "sortAsc",
                SortDirection::Desc => "sortDesc",
            };
            request = request.with_param(name, self.param_for(&sort.field));
        }

        request
            .with_param("limit", query.page_size().to_string())
            .with_param("page", query.page().to_string())
    }

    fn parse_response(&self, body: Value, query: &NormalizedQuery) -> TransportResult<Page> {
        let records = require_collection(&body, None, SOURCE)?
            .iter()
            .map(|raw| self.parse_record(raw))
            .collect::<TransportResult<Vec<_>>>()?;
        Ok(Page::new(records, query.page(), query.page_size(), None))
    }

    fn parse_record(&self, raw: &Value) -> TransportResult<Record> {
        let id = required_id(raw, "id", SOURCE)?;
        let display_name = first_str(raw, &["display_name", "name"]).unwrap_or_else(|| id.clone());

        let mut attributes = BTreeMap::new();
        for (name, path) in STANDARD_ATTRIBUTES {
            if let Some(value) = lookup_path(raw, path) {
                attributes.insert(name.to_string(), value);
            }
        }
        let description = first_str(raw, &["description"]).or_else(|| {
            match lookup_path(raw, "descriptions.description") {
                Some(Value::Array(items)) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
                _ => None,
            }
        });
        if let Some(description) = description {
            attributes.insert("description".to_string(), Value::String(description));
        }
        for (name, (_, mapping)) in &self.fields {
            if let Some(value) = lookup_path(raw, &mapping.path) {
                attributes.insert(name.clone(), value);
            }
        }

        let mut source_ref = SourceRef::new(&self.metadata_set_id, &id);
        if let Some(url) = first_str(raw, &["url"]) {
            source_ref = source_ref.with_url(url);
        }

        Ok(Record {
            resource_type: self.resource_type.clone(),
            id,
            display_name,
            attributes,
            source_ref,
        })
    }

    fn build_resource_request(&self, source_ref: &SourceRef) -> TransportRequest {
        TransportRequest::get(format!(
            "{}{}/",
            self.concepts_url,
            urlencoding::encode(&source_ref.native_id)
        ))
        .with_param("verbose", "true")
    }

    fn build_autocomplete(&self, term: &str, limit: u32) -> TransportRequest {
        let request = TransportRequest::get(&self.concepts_url).with_param("q", term);
        self.with_concept_class(request)
            .with_param("limit", limit.to_string())
            .with_param("page", "1")
    }

    fn parse_autocomplete(&self, body: Value) -> TransportResult<Vec<String>> {
        let items = body.as_array().ok_or_else(|| {
            TransportError::Decode(format!("{SOURCE} autocomplete response is not an array"))
        })?;
        let mut names: Vec<String> = Vec::new();
        for item in items {
            if let Some(name) = first_str(item, &["display_name", "name", "id"]) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }
}
