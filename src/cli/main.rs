//! metadata-cli - search and export catalog metadata from the command line

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use metadata_connector::cli::commands::{
    AutocompleteArgs, ExportArgs, FiltersArgs, GetArgs, SearchArgs, handle_autocomplete,
    handle_export, handle_filters, handle_get, handle_search, handle_sets, parse_header,
};
#[cfg(feature = "cli")]
use metadata_connector::cli::error::CliError;
#[cfg(feature = "cli")]
use metadata_connector::{CancellationToken, ConnectorConfig, ConnectorRegistry};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding an API token for the `Authorization` header
#[cfg(feature = "cli")]
const TOKEN_ENV: &str = "METADATA_CONNECTOR_TOKEN";

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "metadata-cli")]
#[command(about = "Browse, search and export metadata from OCL and DHIS2 catalogs")]
#[command(version)]
struct Cli {
    /// Connector configuration file (TOML or JSON)
    #[arg(short, long, global = true, default_value = "metadata-connector.toml")]
    config: PathBuf,

    /// Extra request header, as "Name: value" (repeatable)
    #[arg(long = "header", global = true)]
    headers: Vec<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// List configured metadata sets
    Sets {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the filters available under a selection
    Filters(FiltersArgs),

    /// Search a metadata set
    Search(SearchArgs),

    /// Show the full detail of one record
    Get(GetArgs),

    /// Suggest names or filter options for a partial term
    Autocomplete(AutocompleteArgs),

    /// Export records as JSON, CSV, YAML or Markdown
    Export(ExportArgs),
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Headers from `--header`, plus the token from the environment unless
/// an `Authorization` header was given explicitly
#[cfg(feature = "cli")]
fn request_headers(args: &[String], token: Option<String>) -> Result<Vec<(String, String)>, CliError> {
    let mut headers = args
        .iter()
        .map(|arg| parse_header(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let has_authorization = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("authorization"));
    if let Some(token) = token.filter(|token| !token.trim().is_empty()) {
        if !has_authorization {
            headers.push(("Authorization".to_string(), format!("Token {}", token.trim())));
        }
    }
    Ok(headers)
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ConnectorConfig::load(&cli.config)?;
    let headers = request_headers(&cli.headers, std::env::var(TOKEN_ENV).ok())?;
    let registry = ConnectorRegistry::from_config_with_http(&config)?.with_headers(headers);

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt received");
            interrupt.cancel();
        }
    });

    match &cli.command {
        Commands::Sets { json } => handle_sets(&registry, *json)?,
        Commands::Filters(args) => handle_filters(&registry, args)?,
        Commands::Search(args) => handle_search(&registry, args, &token).await?,
        Commands::Get(args) => handle_get(&registry, args).await?,
        Commands::Autocomplete(args) => handle_autocomplete(&registry, args).await?,
        Commands::Export(args) => handle_export(&registry, args, &token).await?,
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
