//! `sets` command: list configured metadata sets

use crate::cli::error::CliError;
use crate::cli::output::format_sets;
use crate::connector::ConnectorRegistry;

/// Print the configured metadata sets, as text or as their JSON configuration
pub fn handle_sets(registry: &ConnectorRegistry, json: bool) -> Result<(), CliError> {
    if json {
        let configs: Vec<_> = registry
            .connectors()
            .map(|connector| connector.metadata_set().config())
            .collect();
        println!("{}", serde_json::to_string_pretty(&configs)?);
    } else {
        print!("{}", format_sets(registry));
    }
    Ok(())
}
