//! Command handlers for the CLI

pub mod autocomplete;
pub mod export;
pub mod filters;
pub mod get;
pub mod search;
pub mod sets;

use std::str::FromStr;

use crate::cli::error::CliError;
use crate::models::{Query, SortDirection};

pub use autocomplete::{AutocompleteArgs, handle_autocomplete};
pub use export::{ExportArgs, handle_export};
pub use filters::{FiltersArgs, handle_filters};
pub use get::{GetArgs, handle_get};
pub use search::{QueryArgs, SearchArgs, handle_search};
pub use sets::handle_sets;

/// Parse a `field=value` filter argument
pub fn parse_filter(arg: &str) -> Result<(String, String), CliError> {
    let (field, value) = arg
        .split_once('=')
        .ok_or_else(|| CliError::InvalidArgument(format!("filter '{arg}' must be field=value")))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(CliError::InvalidArgument(format!("filter '{arg}' has no field name")));
    }
    Ok((field.to_string(), value.trim().to_string()))
}

/// Parse a `Name: value` header argument
pub fn parse_header(arg: &str) -> Result<(String, String), CliError> {
    let (name, value) = arg
        .split_once(':')
        .ok_or_else(|| CliError::InvalidArgument(format!("header '{arg}' must be 'Name: value'")))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(CliError::InvalidArgument(format!("invalid header name in '{arg}'")));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse a `field` or `field:asc|desc` sort argument
pub fn parse_sort(arg: &str) -> Result<(String, SortDirection), CliError> {
    let (field, direction) = match arg.split_once(':') {
        Some((field, direction)) => (
            field,
            SortDirection::from_str(direction).map_err(CliError::InvalidArgument)?,
        ),
        None => (arg, SortDirection::default()),
    };
    if field.trim().is_empty() {
        return Err(CliError::InvalidArgument(format!("sort '{arg}' has no field name")));
    }
    Ok((field.trim().to_string(), direction))
}

/// Add `field=value` filter arguments to a query
pub(crate) fn apply_filters(mut query: Query, filters: &[String]) -> Result<Query, CliError> {
    for filter in filters {
        let (field, value) = parse_filter(filter)?;
        query = query.with_filter(field, value);
    }
    Ok(query)
}
