//! Output formatting for CLI

use std::collections::BTreeMap;

use crate::connector::ConnectorRegistry;
use crate::models::{FilterField, FilterKind, Page, Record};

const NAME_WIDTH: usize = 60;

/// One line per configured metadata set
pub fn format_sets(registry: &ConnectorRegistry) -> String {
    let mut output = String::new();
    for connector in registry.connectors() {
        let set = connector.metadata_set();
        output.push_str(&format!(
            "{}  {} [{}]\n",
            set.id(),
            set.name(),
            set.adapter().kind()
        ));
        for resource_type in set.resource_types() {
            let formats: Vec<&str> = set
                .export_formats(&resource_type)
                .iter()
                .map(|format| format.as_str())
                .collect();
            output.push_str(&format!(
                "    {}: export {}\n",
                resource_type,
                if formats.is_empty() {
                    "-".to_string()
                } else {
                    formats.join(", ")
                }
            ));
        }
    }
    if output.is_empty() {
        output.push_str("No metadata sets configured\n");
    }
    output
}

/// Available filters with their current options
pub fn format_filters(filters: &BTreeMap<String, FilterField>) -> String {
    let mut output = String::new();
    for field in filters.values() {
        output.push_str(&format!("{} ({})", field.name, field.kind.as_str()));
        if let Some(label) = &field.label {
            output.push_str(&format!(" - {label}"));
        }
        if !field.depends_on.is_empty() {
            output.push_str(&format!(" [depends on: {}]", field.depends_on.join(", ")));
        }
        output.push('\n');

        match field.kind {
            FilterKind::Range => {
                if let Some(range) = &field.range {
                    output.push_str(&format!("    {} .. {}\n", range.min, range.max));
                }
            }
            FilterKind::Boolean => output.push_str("    true | false\n"),
            FilterKind::Text | FilterKind::Categorical => {
                for option in &field.options {
                    match &option.label {
                        Some(label) => output.push_str(&format!("    {} ({})\n", option.value, label)),
                        None => output.push_str(&format!("    {}\n", option.value)),
                    }
                }
            }
        }
    }
    if output.is_empty() {
        output.push_str("No filters\n");
    }
    output
}

/// Compact table of a result page with a paging footer
pub fn format_page(page: &Page) -> String {
    let id_width = page
        .records()
        .iter()
        .map(|record| record.id.chars().count())
        .max()
        .unwrap_or(2)
        .max(2);

    let mut output = format!("{:<id_width$}  NAME\n", "ID");
    for record in page.records() {
        output.push_str(&format!(
            "{:<id_width$}  {}\n",
            record.id,
            truncate(&record.display_name, NAME_WIDTH)
        ));
    }

    output.push_str(&format!(
        "\nPage {} ({} per page): {} record(s)",
        page.page_number(),
        page.page_size(),
        page.len()
    ));
    if let Some(total) = page.total_count() {
        output.push_str(&format!(" of {total}"));
    }
    if page.has_more() {
        output.push_str(", more available");
    }
    output.push('\n');
    output
}

/// Record detail as `name: value` lines
pub fn format_record(record: &Record) -> String {
    let mut output = format!(
        "{} ({})\n  id: {}\n",
        record.display_name, record.resource_type, record.id
    );
    for name in record.attributes.keys() {
        match record.attribute_text(name) {
            Some(text) if !text.is_empty() => output.push_str(&format!("  {name}: {text}\n")),
            _ => {}
        }
    }
    if let Some(url) = &record.source_ref.url {
        output.push_str(&format!("  source: {url}\n"));
    }
    output
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(width.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}
