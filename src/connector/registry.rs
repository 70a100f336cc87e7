//! Registry of connectors, one per configured metadata set

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Connector, ConnectorError};
use crate::config::{ConfigError, ConnectorConfig};
use crate::metadata_set::MetadataSet;
use crate::models::{Page, Query};
use crate::transport::Transport;

/// Connectors keyed by metadata set id, sharing one transport
#[derive(Debug, Clone, Default)]
pub struct ConnectorRegistry {
    connectors: BTreeMap<String, Connector>,
}

impl ConnectorRegistry {
    /// Build a connector for every configured set
    pub fn from_config(
        config: &ConnectorConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut registry = Self::default();
        for set_config in &config.metadata_sets {
            let set = MetadataSet::from_config(set_config.clone())?;
            registry.insert(Connector::new(Arc::new(set), transport.clone()));
        }
        tracing::debug!(metadata_sets = registry.len(), "Connector registry ready");
        Ok(registry)
    }

    /// Build with an HTTP transport configured from `config.transport`
    #[cfg(feature = "http-transport")]
    pub fn from_config_with_http(config: &ConnectorConfig) -> Result<Self, ConfigError> {
        let transport = crate::transport::HttpTransport::new(config.transport.clone())
            .map_err(|e| ConfigError::Transport(e.to_string()))?;
        Self::from_config(config, Arc::new(transport))
    }

    /// Pass caller-supplied headers with every request of every connector
    pub fn with_headers(self, headers: Vec<(String, String)>) -> Self {
        Self {
            connectors: self
                .connectors
                .into_iter()
                .map(|(id, connector)| (id, connector.with_headers(headers.clone())))
                .collect(),
        }
    }

    /// Add or replace the connector of a set
    pub fn insert(&mut self, connector: Connector) {
        self.connectors
            .insert(connector.metadata_set().id().to_string(), connector);
    }

    pub fn get(&self, id: &str) -> Option<&Connector> {
        self.connectors.get(id)
    }

    /// Connector for `id`, or [`ConnectorError::UnknownMetadataSet`]
    pub fn connector(&self, id: &str) -> Result<&Connector, ConnectorError> {
        self.get(id)
            .ok_or_else(|| ConnectorError::UnknownMetadataSet(id.to_string()))
    }

    /// Set ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Route a query to the connector of its metadata set
    pub async fn search(&self, query: &Query) -> Result<Page, ConnectorError> {
        self.connector(&query.metadata_set_id)?.search(query).await
    }
}
