//! `search` command

use crate::cli::commands::{apply_filters, parse_sort};
use crate::cli::error::CliError;
use crate::cli::output::format_page;
use crate::connector::{CancellationToken, ConnectorError, ConnectorRegistry};
use crate::models::query::DEFAULT_PAGE_SIZE;
use crate::models::{Page, Query};

/// Query options shared by `search` and `export`
#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    /// Metadata set id
    pub set: String,
    /// Free-text search term
    #[arg(short = 'q', long = "query")]
    pub search: Option<String>,
    /// Filter, as field=value (repeatable; values of one field are OR-ed)
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,
    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    pub page: u32,
    /// Records per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
    /// Sort, as field or field:asc|desc
    #[arg(short, long)]
    pub sort: Option<String>,
}

impl QueryArgs {
    /// Build the query these arguments describe
    pub fn to_query(&self) -> Result<Query, CliError> {
        let mut query = apply_filters(Query::new(&self.set), &self.filters)?
            .with_page(self.page)
            .with_page_size(self.page_size);
        if let Some(term) = &self.search {
            query = query.with_search(term);
        }
        if let Some(sort) = &self.sort {
            let (field, direction) = parse_sort(sort)?;
            query = query.with_sort(field, direction);
        }
        Ok(query)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub query: QueryArgs,
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Run one search, abandoning it when `token` is cancelled
pub async fn run_search(
    registry: &ConnectorRegistry,
    args: &QueryArgs,
    token: &CancellationToken,
) -> Result<Page, CliError> {
    let query = args.to_query()?;
    match registry
        .connector(&args.set)?
        .search_with_cancel(&query, token)
        .await
    {
        Err(ConnectorError::Canceled) => Err(CliError::Interrupted),
        result => Ok(result?),
    }
}

pub async fn handle_search(
    registry: &ConnectorRegistry,
    args: &SearchArgs,
    token: &CancellationToken,
) -> Result<(), CliError> {
    let page = run_search(registry, &args.query, token).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print!("{}", format_page(&page));
    }
    Ok(())
}
