//! `filters` command: show the filters available under a selection

use crate::cli::commands::apply_filters;
use crate::cli::error::CliError;
use crate::cli::output::format_filters;
use crate::connector::ConnectorRegistry;
use crate::models::Query;

#[derive(clap::Args, Debug, Clone)]
pub struct FiltersArgs {
    /// Metadata set id
    pub set: String,
    /// Current selection, as field=value (repeatable)
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn handle_filters(registry: &ConnectorRegistry, args: &FiltersArgs) -> Result<(), CliError> {
    let connector = registry.connector(&args.set)?;
    let query = apply_filters(Query::new(&args.set), &args.filters)?;
    let filters = connector.metadata_set().available_filters(&query.selections());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&filters)?);
    } else {
        print!("{}", format_filters(&filters));
    }
    Ok(())
}
