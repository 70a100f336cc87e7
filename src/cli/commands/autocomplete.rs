//! `autocomplete` command

use crate::cli::error::CliError;
use crate::connector::ConnectorRegistry;

#[derive(clap::Args, Debug, Clone)]
pub struct AutocompleteArgs {
    /// Metadata set id
    pub set: String,
    /// Partial term
    pub term: String,
    /// Complete options of this filter field instead of record names
    #[arg(short, long)]
    pub field: Option<String>,
}

pub async fn handle_autocomplete(
    registry: &ConnectorRegistry,
    args: &AutocompleteArgs,
) -> Result<(), CliError> {
    let connector = registry.connector(&args.set)?;
    if !connector
        .metadata_set()
        .supports_autocomplete(args.field.as_deref())
    {
        eprintln!("Autocomplete is not available for this metadata set");
        return Ok(());
    }
    for suggestion in connector
        .autocomplete(&args.term, args.field.as_deref())
        .await?
    {
        println!("{suggestion}");
    }
    Ok(())
}
