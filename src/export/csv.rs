//! CSV exporter
//!
//! Output follows RFC 4180: CRLF line endings, and any field containing a
//! comma, double quote or line break is wrapped in double quotes with
//! internal quotes doubled.

use super::{cell, columns};
use crate::models::Record;

/// Exporter for comma-separated values
pub struct CsvExporter;

impl CsvExporter {
    /// Header row of column names, then one row per record
    pub fn export(records: &[Record]) -> String {
        let columns = columns(records);
        let mut output = String::new();

        let header: Vec<String> = columns.iter().map(|c| Self::escape_field(c)).collect();
        output.push_str(&header.join(","));
        output.push_str("\r\n");

        for record in records {
            let row: Vec<String> = columns
                .iter()
                .map(|column| Self::escape_field(&cell(record, column)))
                .collect();
            output.push_str(&row.join(","));
            output.push_str("\r\n");
        }
        output
    }

    /// Quote a field when it contains a delimiter, quote or line break
    pub fn escape_field(field: &str) -> String {
        if field.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::record;

    #[test]
    fn test_escape_field() {
        assert_eq!(CsvExporter::escape_field("plain"), "plain");
        assert_eq!(CsvExporter::escape_field("a,b"), "\"a,b\"");
        assert_eq!(CsvExporter::escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(CsvExporter::escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_export_rows() {
        let output = CsvExporter::export(&[record("TX_CURR", "TX_CURR, Currently on ART")]);
        let lines: Vec<&str> = output.split("\r\n").collect();
        assert_eq!(lines[0], "id,display_name,resource_type,datatype,periods");
        assert_eq!(
            lines[1],
            "TX_CURR,\"TX_CURR, Currently on ART\",reference_indicator,Numeric,FY22; FY23"
        );
        assert_eq!(lines[2], "");
    }
}
