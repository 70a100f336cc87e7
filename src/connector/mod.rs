//! Connector façade
//!
//! A [`Connector`] is what callers use to browse one metadata set. It
//! validates queries through the [`MetadataSet`], hands the normalized query
//! to the bound source adapter, sends the request through the
//! [`Transport`], and returns the resulting [`Page`] untouched. Results are
//! never cached: every search is a fresh network call.
//!
//! All calls are cancellable. A canceled call drops its in-flight request
//! and never mutates shared state; the metadata set is read-only.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use metadata_connector::adapters::AdapterKind;
//! use metadata_connector::config::MetadataSetConfig;
//! use metadata_connector::connector::Connector;
//! use metadata_connector::models::Query;
//! use metadata_connector::transport::{HttpTransport, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MetadataSetConfig::new(
//!     "reference-indicators",
//!     "https://api.staging.openconceptlab.org",
//!     AdapterKind::Ocl,
//! )
//! .with_organization("PEPFAR-Test7")
//! .with_source("MER")
//! .with_concept_class("Reference Indicator");
//!
//! let transport = Arc::new(HttpTransport::new(TransportConfig::default())?);
//! let connector = Connector::from_config(config, transport)?;
//! let page = connector.search(&Query::new("reference-indicators").with_page_size(10)).await?;
//! println!("{} indicators", page.len());
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod error;
pub mod registry;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use cancel::{CancellationToken, SearchHandle};
pub use error::ConnectorError;
pub use registry::ConnectorRegistry;

use crate::adapters::AUTOCOMPLETE_LIMIT;
use crate::config::{ConfigError, MetadataSetConfig};
use crate::export::{
    ExportArtifact, ExportEngine, ExportError, ExportJob, ExportSelection, RecordResolver,
};
use crate::metadata_set::MetadataSet;
use crate::models::{ExportFormat, Page, Query, Record, SourceRef};
use crate::transport::{HeaderTransport, Transport};

/// Façade over one metadata set and its source
#[derive(Clone)]
pub struct Connector {
    set: Arc<MetadataSet>,
    transport: Arc<dyn Transport>,
    engine: ExportEngine,
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("metadata_set", &self.set.id())
            .field("adapter", &self.set.adapter().kind())
            .finish()
    }
}

impl Connector {
    pub fn new(set: Arc<MetadataSet>, transport: Arc<dyn Transport>) -> Self {
        Self {
            set,
            transport,
            engine: ExportEngine::new(),
        }
    }

    /// Build the metadata set from configuration and bind it to `transport`
    pub fn from_config(
        config: MetadataSetConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(MetadataSet::from_config(config)?), transport))
    }

    /// Pass caller-supplied headers (e.g. `Authorization`) with every request
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        if !headers.is_empty() {
            self.transport = Arc::new(HeaderTransport::new(self.transport, headers));
        }
        self
    }

    pub fn with_export_engine(mut self, engine: ExportEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn metadata_set(&self) -> &MetadataSet {
        &self.set
    }

    /// Run a search and return one page
    ///
    /// Invalid queries fail with [`ConnectorError::Validation`] before any
    /// network call. Transport failures keep their kind, including
    /// `Empty` when the source returns no records.
    pub async fn search(&self, query: &Query) -> Result<Page, ConnectorError> {
        let normalized = self.set.validate(query).map_err(|e| {
            tracing::debug!(metadata_set = %self.set.id(), error = %e, "Query rejected");
            e
        })?;

        let adapter = self.set.adapter();
        let request = adapter.build_query(&normalized);
        tracing::debug!(
            metadata_set = %self.set.id(),
            url = %request.full_url(),
            page = normalized.page(),
            page_size = normalized.page_size(),
            "Searching"
        );

        let body = self.transport.request(&request).await.map_err(|e| {
            tracing::warn!(metadata_set = %self.set.id(), error = %e, "Search request failed");
            e
        })?;
        let page = adapter.parse_response(body, &normalized).map_err(|e| {
            tracing::warn!(metadata_set = %self.set.id(), error = %e, "Search response rejected");
            e
        })?;

        tracing::info!(
            metadata_set = %self.set.id(),
            records = page.len(),
            total = ?page.total_count(),
            has_more = page.has_more(),
            "Search complete"
        );
        Ok(page)
    }

    /// Search, giving up as soon as `token` is cancelled
    pub async fn search_with_cancel(
        &self,
        query: &Query,
        token: &CancellationToken,
    ) -> Result<Page, ConnectorError> {
        let result = token.run(self.search(query), ConnectorError::Canceled).await;
        if matches!(result, Err(ConnectorError::Canceled)) {
            tracing::debug!(metadata_set = %self.set.id(), "Search canceled");
        }
        result
    }

    /// Run a search on its own task
    pub fn spawn_search(&self, query: Query) -> SearchHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let connector = self.clone();
        let task = tokio::spawn(async move { connector.search_with_cancel(&query, &task_token).await });
        SearchHandle::new(token, task)
    }

    /// Suggestions for a search term, or for one field's options
    ///
    /// Without a field, sets declaring full-text autocomplete ask the source
    /// for matching names. With a field, its options are filtered locally.
    /// Unsupported autocomplete yields an empty list.
    pub async fn autocomplete(
        &self,
        term: &str,
        field: Option<&str>,
    ) -> Result<Vec<String>, ConnectorError> {
        if !self.set.supports_autocomplete(field) {
            return Ok(Vec::new());
        }
        if let Some(name) = field {
            return Ok(self
                .set
                .field(name)
                .map(|field| field.matching_options(term))
                .unwrap_or_default());
        }

        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let adapter = self.set.adapter();
        let request = adapter.build_autocomplete(term, AUTOCOMPLETE_LIMIT);
        let body = self.transport.request(&request).await?;
        Ok(adapter.parse_autocomplete(body)?)
    }

    /// Full detail of a record
    pub async fn get_resource(&self, source_ref: &SourceRef) -> Result<Record, ConnectorError> {
        self.set.get_resource(self.transport.as_ref(), source_ref).await
    }

    /// Full detail of a record by its native id
    pub async fn get_resource_by_id(&self, id: &str) -> Result<Record, ConnectorError> {
        self.get_resource(&self.set.source_ref(id)).await
    }

    /// Export a record or a set of records
    ///
    /// The format must be declared for every resource type in the selection;
    /// otherwise this fails with [`ExportError::UnsupportedFormat`] without
    /// touching the source.
    pub async fn export(
        &self,
        selection: ExportSelection,
        format: ExportFormat,
    ) -> Result<ExportArtifact, ExportError> {
        let job = self.prepare_export(selection, format)?;
        self.engine.run(job, self).await
    }

    /// Export, giving up as soon as `token` is cancelled
    pub async fn export_with_cancel(
        &self,
        selection: ExportSelection,
        format: ExportFormat,
        token: &CancellationToken,
    ) -> Result<ExportArtifact, ExportError> {
        token
            .run(self.export(selection, format), ExportError::Canceled)
            .await
    }

    fn prepare_export(
        &self,
        selection: ExportSelection,
        format: ExportFormat,
    ) -> Result<ExportJob, ExportError> {
        if selection.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        let types = selection.resource_types();
        if let Some(unsupported) = types
            .iter()
            .find(|resource_type| !self.set.export_formats(resource_type).contains(&format))
        {
            tracing::debug!(
                metadata_set = %self.set.id(),
                format = %format,
                resource_type = %unsupported,
                "Export format not available"
            );
            return Err(ExportError::UnsupportedFormat {
                format,
                resource_type: unsupported.to_string(),
            });
        }
        ExportJob::new(selection, format)
    }

    /// Formats available for every resource type in a selection
    pub fn export_formats_for(&self, selection: &ExportSelection) -> BTreeSet<ExportFormat> {
        let mut types = selection.resource_types().into_iter();
        let Some(first) = types.next() else {
            return BTreeSet::new();
        };
        types.fold(self.set.export_formats(&first), |formats, resource_type| {
            formats
                .intersection(&self.set.export_formats(&resource_type))
                .copied()
                .collect()
        })
    }
}

#[async_trait]
impl RecordResolver for Connector {
    async fn resolve(&self, record: &Record) -> Result<Record, ConnectorError> {
        self.get_resource(&record.source_ref).await
    }
}
