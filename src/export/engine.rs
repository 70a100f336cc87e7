//! Export engine
//!
//! Drives one [`ExportJob`] to an [`ExportArtifact`]. Before rendering, each
//! selected record can be re-fetched in full through a [`RecordResolver`]
//! (search results may carry a summary only). Any failure moves the job to
//! `failed`; failed jobs are never retried here.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};

use super::job::{ExportJob, ExportState};
use super::{render, ExportArtifact, ExportError, ExportSelection};
use crate::connector::ConnectorError;
use crate::models::Record;

/// Source of full record detail for exports
#[async_trait]
pub trait RecordResolver: Send + Sync {
    /// Fetch the full detail of a record
    async fn resolve(&self, record: &Record) -> Result<Record, ConnectorError>;
}

/// Stateless export engine; one instance may run many jobs concurrently
#[derive(Debug, Clone)]
pub struct ExportEngine {
    resolve_details: bool,
}

impl Default for ExportEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportEngine {
    pub fn new() -> Self {
        Self {
            resolve_details: true,
        }
    }

    /// Whether records are re-fetched in full before rendering (default true)
    pub fn with_resolve_details(mut self, resolve_details: bool) -> Self {
        self.resolve_details = resolve_details;
        self
    }

    /// Run a pending job to completion
    pub async fn run(
        &self,
        mut job: ExportJob,
        resolver: &dyn RecordResolver,
    ) -> Result<ExportArtifact, ExportError> {
        job.transition(ExportState::Generating)?;
        tracing::info!(
            job_id = %job.id(),
            format = %job.format(),
            resource_type = %job.resource_type(),
            records = job.selection().len(),
            "Generating export"
        );

        match self.generate(&job, resolver).await {
            Ok(artifact) => {
                job.transition(ExportState::Ready)?;
                tracing::info!(
                    job_id = %job.id(),
                    file_name = %artifact.file_name,
                    bytes = artifact.payload.len(),
                    "Export ready"
                );
                Ok(artifact)
            }
            Err(e) => {
                job.transition(ExportState::Failed)?;
                tracing::warn!(job_id = %job.id(), error = %e, "Export failed");
                Err(e)
            }
        }
    }

    async fn generate(
        &self,
        job: &ExportJob,
        resolver: &dyn RecordResolver,
    ) -> Result<ExportArtifact, ExportError> {
        let types = job.selection().resource_types();
        if types.len() > 1 {
            return Err(ExportError::MixedResourceTypes(
                types.iter().map(|t| t.to_string()).collect(),
            ));
        }

        let selection = if self.resolve_details {
            let mut resolved = Vec::with_capacity(job.selection().len());
            for record in job.selection().records() {
                let full = resolver
                    .resolve(record)
                    .await
                    .map_err(|source| ExportError::Fetch {
                        id: record.id.clone(),
                        source,
                    })?;
                resolved.push(full);
            }
            match job.selection() {
                ExportSelection::Single(_) => match resolved.pop() {
                    Some(record) => ExportSelection::Single(record),
                    None => return Err(ExportError::EmptySelection),
                },
                ExportSelection::Set(_) => ExportSelection::Set(resolved),
            }
        } else {
            job.selection().clone()
        };

        let payload = render(job.format(), &selection)?.into_bytes();
        let checksum = format!("{:x}", Sha256::digest(&payload));

        Ok(ExportArtifact {
            job_id: job.id(),
            format: job.format(),
            mime_type: job.format().mime_type().to_string(),
            file_name: file_name(job, &selection),
            record_count: selection.len(),
            payload,
            generated_at: Utc::now(),
            checksum,
        })
    }
}

/// Suggested file name: the record id for single exports, the resource type and a timestamp for sets
fn file_name(job: &ExportJob, selection: &ExportSelection) -> String {
    let stem = match selection {
        ExportSelection::Single(record) => sanitize(&record.id),
        ExportSelection::Set(_) => format!(
            "{}-export-{}",
            sanitize(job.resource_type().as_str()),
            job.created_at().format("%Y%m%d%H%M%S")
        ),
    };
    format!("{stem}.{}", job.format().extension())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
