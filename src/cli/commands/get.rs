//! `get` command: full detail of one record

use crate::cli::error::CliError;
use crate::cli::output::format_record;
use crate::connector::ConnectorRegistry;

#[derive(clap::Args, Debug, Clone)]
pub struct GetArgs {
    /// Metadata set id
    pub set: String,
    /// Native record id
    pub id: String,
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_get(registry: &ConnectorRegistry, args: &GetArgs) -> Result<(), CliError> {
    let record = registry
        .connector(&args.set)?
        .get_resource_by_id(&args.id)
        .await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", format_record(&record));
    }
    Ok(())
}
