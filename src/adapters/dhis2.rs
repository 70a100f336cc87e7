//! DHIS2 metadata API adapter
//!
//! Browses `{base}/api/dataElements.json`. DHIS2 reports a pager with the
//! total match count, filters use `property:operator:value` expressions and
//! every `filter` parameter must hold (root junction AND).

use std::collections::BTreeMap;

use serde_json::Value;

use super::{
    builtin_mapping, first_str, lookup_path, require_collection, required_id, resolve_mappings,
    AdapterKind, FieldMapping, SourceAdapter,
};
use crate::config::{ConfigError, MetadataSetConfig};
use crate::models::filter::{parse_bool, parse_range};
use crate::models::{FilterKind, NormalizedQuery, Page, Record, ResourceType, SourceRef};
use crate::transport::{TransportError, TransportRequest, TransportResult};

const SOURCE: &str = "DHIS2";
const COLLECTION: &str = "dataElements";

/// Properties requested for every data element
const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "displayName",
    "code",
    "description",
    "valueType",
    "domainType",
    "aggregationType",
    "lastUpdated",
    "categoryCombo[id,displayName]",
    "dataElementGroups[id,displayName]",
];

/// Vocabulary fields DHIS2 understands natively: (field, property, JSON path)
const BUILTIN_FIELDS: &[(&str, &str, &str)] = &[
    ("id", "id", "id"),
    ("display_name", "displayName", "displayName"),
    ("code", "code", "code"),
    ("value_type", "valueType", "valueType"),
    ("domain_type", "domainType", "domainType"),
    ("aggregation_type", "aggregationType", "aggregationType"),
    ("group", "dataElementGroups.id", "dataElementGroups.id"),
    ("category_combo", "categoryCombo.id", "categoryCombo.id"),
    ("updated_on", "lastUpdated", "lastUpdated"),
];

const STANDARD_ATTRIBUTES: &[(&str, &str)] = &[
    ("code", "code"),
    ("description", "description"),
    ("value_type", "valueType"),
    ("domain_type", "domainType"),
    ("aggregation_type", "aggregationType"),
    ("category_combo", "categoryCombo.displayName"),
    ("groups", "dataElementGroups.displayName"),
    ("updated_on", "lastUpdated"),
];

/// Adapter for a DHIS2 instance's data-element catalog
#[derive(Debug, Clone)]
pub struct Dhis2Adapter {
    metadata_set_id: String,
    api_url: String,
    resource_type: ResourceType,
    fields: BTreeMap<String, (FilterKind, FieldMapping)>,
    requested_fields: String,
}

impl Dhis2Adapter {
    pub fn from_config(config: &MetadataSetConfig) -> Result<Self, ConfigError> {
        let base = config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(ConfigError::Invalid {
                set: config.id.clone(),
                message: "base_url must not be empty".to_string(),
            });
        }
        let api_url = if base.ends_with("/api") {
            base.to_string()
        } else {
            format!("{base}/api")
        };

        let mappings = resolve_mappings(&config.fields, BUILTIN_FIELDS, str::to_string);

        // Ask for the top-level property of every configured path as well
        let mut requested: Vec<String> = DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect();
        for mapping in &mappings {
            let top = mapping.path.split('.').next().unwrap_or(&mapping.path);
            let present = requested
                .iter()
                .any(|f| f == top || f.starts_with(&format!("{top}[")));
            if !present {
                requested.push(top.to_string());
            }
        }

        let fields = config
            .fields
            .iter()
            .zip(mappings)
            .map(|(field, mapping)| (field.name.clone(), (field.kind, mapping)))
            .collect();

        Ok(Self {
            metadata_set_id: config.id.clone(),
            api_url,
            resource_type: ResourceType::new(&config.resource_type),
            fields,
            requested_fields: requested.join(","),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/{COLLECTION}.json", self.api_url)
    }

    fn property_for(&self, field: &str) -> String {
        self.fields
            .get(field)
            .map(|(_, mapping)| mapping.param.clone())
            .or_else(|| builtin_mapping(BUILTIN_FIELDS, field).map(|m| m.param))
            .unwrap_or_else(|| field.to_string())
    }

    /// Filter expressions for one field's selected values
    ///
    /// Values of one field are alternatives, but separate `filter`
    /// parameters are AND-ed, so each field yields a single condition or
    /// none at all.
    fn filter_expressions(&self, field: &str, values: &[String]) -> Vec<String> {
        let property = self.property_for(field);
        let kind = self.fields.get(field).map(|(kind, _)| *kind);
        match kind {
            // Validation admits one range per field
            Some(FilterKind::Range) => match values.first().map(|v| (v, parse_range(v))) {
                Some((_, Some((lo, hi)))) => vec![
                    format!("{property}:ge:{}", format_number(lo)),
                    format!("{property}:le:{}", format_number(hi)),
                ],
                Some((value, None)) => vec![format!("{property}:eq:{value}")],
                None => Vec::new(),
            },
            Some(FilterKind::Boolean) => {
                let mut selected: Vec<bool> = values.iter().filter_map(|v| parse_bool(v)).collect();
                selected.dedup();
                match selected.as_slice() {
                    [only] => vec![format!("{property}:eq:{only}")],
                    _ => Vec::new(),
                }
            }
            Some(FilterKind::Text) if values.len() == 1 => {
                vec![format!("{property}:ilike:{}", values[0])]
            }
            _ => match values {
                [value] => vec![format!("{property}:eq:{value}")],
                _ => vec![format!("{property}:in:[{}]", values.join(","))],
            },
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl SourceAdapter for Dhis2Adapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Dhis2
    }

    fn build_query(&self, query: &NormalizedQuery) -> TransportRequest {
        let mut request = TransportRequest::get(self.collection_url())
            .with_param("paging", "true")
            .with_param("page", query.page().to_string())
            .with_param("pageSize", query.page_size().to_string())
            .with_param("fields", &self.requested_fields);

        for (field, values) in query.filters() {
            for expression in self.filter_expressions(field, values) {
                request = request.with_param("filter", expression);
            }
        }

        if let Some(term) = query.search() {
            request = request.with_param("filter", format!("displayName:ilike:{term}"));
        }

        if let Some(sort) = query.sort() {
            request = request.with_param(
                "order",
                format!("{}:{}", self.property_for(&sort.field), sort.direction.as_str()),
            );
        }

        request
    }

    fn parse_response(&self, body: Value, query: &NormalizedQuery) -> TransportResult<Page> {
        let records = require_collection(&body, Some(COLLECTION), SOURCE)?
            .iter()
            .map(|raw| self.parse_record(raw))
            .collect::<TransportResult<Vec<_>>>()?;
        let total = body
            .get("pager")
            .and_then(|pager| pager.get("total"))
            .and_then(Value::as_u64);
        Ok(Page::new(records, query.page(), query.page_size(), total))
    }

    fn parse_record(&self, raw: &Value) -> TransportResult<Record> {
        let id = required_id(raw, "id", SOURCE)?;
        let display_name = first_str(raw, &["displayName", "name", "shortName"])
            .unwrap_or_else(|| id.clone());

        let mut attributes = BTreeMap::new();
        for (name, path) in STANDARD_ATTRIBUTES {
            if let Some(value) = lookup_path(raw, path) {
                attributes.insert(name.to_string(), value);
            }
        }
        for (name, (_, mapping)) in &self.fields {
            if let Some(value) = lookup_path(raw, &mapping.path) {
                attributes.insert(name.clone(), value);
            }
        }

        let mut source_ref = SourceRef::new(&self.metadata_set_id, &id);
        if let Some(href) = first_str(raw, &["href"]) {
            source_ref = source_ref.with_url(href);
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
            "{}/{COLLECTION}/{}.json",
            self.api_url,
            urlencoding::encode(&source_ref.native_id)
        ))
        .with_param("fields", &self.requested_fields)
    }

    fn build_autocomplete(&self, term: &str, limit: u32) -> TransportRequest {
        TransportRequest::get(self.collection_url())
            .with_param("paging", "true")
            .with_param("page", "1")
            .with_param("pageSize", limit.to_string())
            .with_param("fields", "id,displayName")
            .with_param("filter", format!("displayName:ilike:{term}"))
            .with_param("order", "displayName:asc")
    }

    fn parse_autocomplete(&self, body: Value) -> TransportResult<Vec<String>> {
        let items = body
            .get(COLLECTION)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TransportError::Decode(format!("{SOURCE} autocomplete response has no {COLLECTION}"))
            })?;
        let mut names: Vec<String> = Vec::new();
        for item in items {
            if let Some(name) = first_str(item, &["displayName", "name", "id"]) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }
}
