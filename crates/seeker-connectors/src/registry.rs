//! Connector registry
//!
//! Maps backend-kind identifiers to shared connector instances. The table is
//! assembled once at startup and only read afterwards.

use crate::connector::{BackendKind, Connector, ConnectorError};
use crate::elastic::ElasticConnector;
use crate::rest_api::RestApiConnector;
use crate::splunk::SplunkConnector;
use seeker_core::SeekerConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Static backend-kind to connector table
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: BTreeMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in simulated connectors
    #[must_use]
    pub fn from_config(config: &SeekerConfig) -> Self {
        let latency = config.simulated_latency();
        Self::new()
            .with(
                BackendKind::Splunk.as_str(),
                Arc::new(SplunkConnector::new(config.splunk.clone()).with_latency(latency)),
            )
            .with(
                BackendKind::Elastic.as_str(),
                Arc::new(ElasticConnector::new(config.elastic.clone()).with_latency(latency)),
            )
            .with(
                BackendKind::RestApi.as_str(),
                Arc::new(RestApiConnector::new(config.rest_api.clone()).with_latency(latency)),
            )
    }

    /// With a connector under `kind` (case-insensitive, replaces any previous entry)
    #[must_use]
    pub fn with(mut self, kind: &str, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(normalize(kind), connector);
        self
    }

    /// Look up the connector for a backend kind
    ///
    /// # Errors
    /// `ConnectorError::UnsupportedBackend` if nothing is registered under `kind`.
    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn Connector>, ConnectorError> {
        self.connectors
            .get(&normalize(kind))
            .cloned()
            .ok_or_else(|| ConnectorError::UnsupportedBackend(kind.to_string()))
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }

    /// Number of registered kinds
    #[must_use]
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("kinds", &self.connectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(kind: &str) -> String {
    kind.trim().to_lowercase()
}
