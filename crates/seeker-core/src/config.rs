//! Threat-Seeker configuration
//!
//! Defaults suit a single-node lab deployment. Values can be loaded from TOML
//! and then overlaid with environment variables.

use crate::error::ConfigError;
use seeker_resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    /// Record cap passed to every connector call
    pub max_results_per_query: usize,
    /// Queries kept from a generated plan
    pub max_queries_per_plan: usize,
    /// In-flight queries per execution
    pub max_concurrent_queries: usize,
    /// Per-query deadline in seconds, including retries
    pub query_timeout_secs: Option<u64>,
    /// Retry policy around connector calls
    pub retry: RetryConfig,
    /// Retry policy around external intelligence calls (plan, critique, analysis)
    pub intel_retry: RetryConfig,
    /// Splunk connection settings
    pub splunk: SplunkSettings,
    /// Elasticsearch connection settings
    pub elastic: ElasticSettings,
    /// REST connector settings
    pub rest_api: RestApiSettings,
    /// Artificial latency added by simulated connectors, in milliseconds
    pub simulated_latency_ms: u64,
}

impl SeekerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With record cap
    #[inline]
    #[must_use]
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results_per_query = max;
        self
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_queries(mut self, max: usize) -> Self {
        self.max_concurrent_queries = max;
        self
    }

    /// With per-query timeout
    #[inline]
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    /// With connector retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Per-query timeout as a duration
    #[inline]
    #[must_use]
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }

    /// Simulated connector latency as a duration
    #[inline]
    #[must_use]
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on invalid TOML, `ConfigError::Invalid` on out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as [`SeekerConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Overlay process environment variables
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup
    ///
    /// Recognized: `SPLUNK_HOST`, `SPLUNK_PORT`, `SPLUNK_USERNAME`, `SPLUNK_PASSWORD`,
    /// `ELASTIC_HOST` (comma separated), `ELASTIC_USERNAME`, `ELASTIC_PASSWORD`,
    /// `MAX_RESULTS_PER_QUERY`, `MAX_QUERIES_PER_PLAN`.
    #[must_use]
    pub fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SPLUNK_HOST") {
            self.splunk.host = host;
        }
        if let Some(port) = parse_env(&lookup, "SPLUNK_PORT") {
            self.splunk.port = port;
        }
        if let Some(user) = lookup("SPLUNK_USERNAME") {
            self.splunk.username = user;
        }
        if let Some(password) = lookup("SPLUNK_PASSWORD") {
            self.splunk.password = password;
        }
        if let Some(hosts) = lookup("ELASTIC_HOST") {
            self.elastic.hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(user) = lookup("ELASTIC_USERNAME") {
            self.elastic.username = user;
        }
        if let Some(password) = lookup("ELASTIC_PASSWORD") {
            self.elastic.password = password;
        }
        if let Some(max) = parse_env(&lookup, "MAX_RESULTS_PER_QUERY") {
            self.max_results_per_query = max;
        }
        if let Some(max) = parse_env(&lookup, "MAX_QUERIES_PER_PLAN") {
            self.max_queries_per_plan = max;
        }
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results_per_query == 0 {
            return Err(ConfigError::invalid("max_results_per_query", "must be at least 1"));
        }
        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::invalid("max_concurrent_queries", "must be at least 1"));
        }
        if self.max_queries_per_plan == 0 {
            return Err(ConfigError::invalid("max_queries_per_plan", "must be at least 1"));
        }
        self.retry
            .validate()
            .map_err(|reason| ConfigError::invalid("retry", reason))?;
        self.intel_retry
            .validate()
            .map_err(|reason| ConfigError::invalid("intel_retry", reason))?;
        Ok(())
    }
}

impl Default for SeekerConfig {
    fn default() -> Self {
        Self {
            max_results_per_query: 1000,
            max_queries_per_plan: 10,
            max_concurrent_queries: 16,
            query_timeout_secs: Some(120),
            retry: RetryConfig::default(),
            intel_retry: RetryConfig::intel_fetch(),
            splunk: SplunkSettings::default(),
            elastic: ElasticSettings::default(),
            rest_api: RestApiSettings::default(),
            simulated_latency_ms: 0,
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

/// Splunk connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplunkSettings {
    /// Management host
    pub host: String,
    /// Management port
    pub port: u16,
    /// Username
    pub username: String,
    /// Password
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for SplunkSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8089,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Elasticsearch connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticSettings {
    /// Cluster URLs
    pub hosts: Vec<String>,
    /// Username
    pub username: String,
    /// Password
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for ElasticSettings {
    fn default() -> Self {
        Self {
            hosts: vec!["http://localhost:9200".to_string()],
            username: String::new(),
            password: String::new(),
        }
    }
}

/// REST connector settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestApiSettings {
    /// Headers merged under every request's own headers
    pub default_headers: BTreeMap<String, String>,
}
