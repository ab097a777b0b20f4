//! Threat-Seeker Connectors
//!
//! Uniform query execution over heterogeneous backends:
//! - [`Connector`]: the async contract every backend adapter implements
//! - [`ConnectorRegistry`]: static backend-kind lookup, case-insensitive
//! - Simulated Splunk, Elasticsearch and REST connectors with lazy sessions

#![warn(unreachable_pub)]

pub mod connector;
pub mod elastic;
mod fixture;
pub mod registry;
pub mod rest_api;
mod session;
pub mod splunk;

pub use connector::{BackendKind, Connector, ConnectorError};
pub use elastic::ElasticConnector;
pub use registry::ConnectorRegistry;
pub use rest_api::{RestApiConnector, RestRequest};
pub use splunk::SplunkConnector;
