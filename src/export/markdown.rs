//! Markdown table exporter

use super::{cell, columns};
use crate::models::Record;

/// Exporter for GitHub-flavoured Markdown tables
pub struct MarkdownExporter;

impl MarkdownExporter {
    pub fn export(records: &[Record]) -> String {
        let columns = columns(records);
        let mut output = String::new();

        output.push_str(&Self::row(columns.iter().map(String::as_str)));
        output.push_str(&Self::row(columns.iter().map(|_| "---")));
        for record in records {
            let cells: Vec<String> = columns
                .iter()
                .map(|column| Self::escape_cell(&cell(record, column)))
                .collect();
            output.push_str(&Self::row(cells.iter().map(String::as_str)));
        }
        output
    }

    fn row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
        let cells: Vec<&str> = cells.collect();
        format!("| {} |\n", cells.join(" | "))
    }

    /// Escape pipes and flatten line breaks so a value stays in its cell
    pub fn escape_cell(value: &str) -> String {
        value
            .replace('|', "\\|")
            .replace("\r\n", "<br>")
            .replace('\n', "<br>")
    }
}
