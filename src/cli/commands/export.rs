//! `export` command: write records in a chosen format

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::commands::search::{QueryArgs, run_search};
use crate::cli::error::CliError;
use crate::connector::{CancellationToken, Connector, ConnectorError, ConnectorRegistry};
use crate::export::{ExportArtifact, ExportError, ExportSelection};
use crate::models::{ExportFormat, Record};

#[derive(clap::Args, Debug, Clone)]
pub struct ExportArgs {
    /// Records to export: these ids, or the search page described by the search options
    #[arg(long = "id")]
    pub ids: Vec<String>,
    /// Export format (json, csv, yaml, markdown)
    #[arg(long, default_value = "json")]
    pub format: ExportFormat,
    /// Output file or directory (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub query: QueryArgs,
}

pub async fn handle_export(
    registry: &ConnectorRegistry,
    args: &ExportArgs,
    token: &CancellationToken,
) -> Result<(), CliError> {
    let connector = registry.connector(&args.query.set)?;
    let selection = select(registry, connector, args, token).await?;

    let artifact = match connector
        .export_with_cancel(selection, args.format, token)
        .await
    {
        Err(ExportError::Canceled) => return Err(CliError::Interrupted),
        result => result?,
    };

    match &args.output {
        Some(path) => {
            let written = write_artifact(path, &artifact)?;
            eprintln!(
                "Exported {} record(s) to {} (sha256 {})",
                artifact.record_count,
                written.display(),
                artifact.checksum
            );
        }
        None => std::io::stdout()
            .write_all(&artifact.payload)
            .map_err(|e| CliError::FileWriteError(PathBuf::from("-"), e.to_string()))?,
    }
    Ok(())
}

async fn select(
    registry: &ConnectorRegistry,
    connector: &Connector,
    args: &ExportArgs,
    token: &CancellationToken,
) -> Result<ExportSelection, CliError> {
    match args.ids.as_slice() {
        [] => {
            let page = run_search(registry, &args.query, token).await?;
            Ok(ExportSelection::Set(page.into_records()))
        }
        [id] => Ok(ExportSelection::Single(fetch(connector, id, token).await?)),
        ids => {
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                records.push(fetch(connector, id, token).await?);
            }
            Ok(ExportSelection::Set(records))
        }
    }
}

async fn fetch(
    connector: &Connector,
    id: &str,
    token: &CancellationToken,
) -> Result<Record, CliError> {
    match token
        .run(connector.get_resource_by_id(id), ConnectorError::Canceled)
        .await
    {
        Err(ConnectorError::Canceled) => Err(CliError::Interrupted),
        result => Ok(result?),
    }
}

/// Write the payload; a directory target receives the artifact's file name
fn write_artifact(path: &Path, artifact: &ExportArtifact) -> Result<PathBuf, CliError> {
    let target = if path.is_dir() {
        path.join(&artifact.file_name)
    } else {
        path.to_path_buf()
    };
    std::fs::write(&target, &artifact.payload)
        .map_err(|e| CliError::FileWriteError(target.clone(), e.to_string()))?;
    Ok(target)
}
