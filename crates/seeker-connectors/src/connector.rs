//! Connector contract
//!
//! A connector adapts one backend system to a uniform query call. Instances are
//! long-lived and shared by every in-flight query for that backend, so
//! implementations must be safe for concurrent use.

use seeker_core::{Record, TimeRange};
use seeker_resilience::{classify_message, RateLimitHint, RateLimitSignal};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Connector failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Backend unreachable or connection setup failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Query malformed for this backend
    #[error("query error: {0}")]
    Query(String),

    /// Backend is throttling the caller
    #[error("rate limited: {message}")]
    RateLimited {
        /// Backend message
        message: String,
        /// Suggested wait before retrying
        retry_after: Option<Duration>,
    },

    /// No connector registered for this backend kind
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),
}

impl ConnectorError {
    /// Rate-limit error, picking up a `retry_delay { seconds: N }` hint from the message
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        let message = message.into();
        let retry_after = classify_message(&message).and_then(|hint| hint.retry_after);
        Self::RateLimited {
            message,
            retry_after,
        }
    }

    /// Check if the retry policy should retry this error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl RateLimitSignal for ConnectorError {
    fn rate_limit_hint(&self) -> Option<RateLimitHint> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(RateLimitHint {
                retry_after: *retry_after,
            }),
            _ => None,
        }
    }
}

/// Backend connector
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Run `query_string` over `time_range`, returning at most `max_results` records
    ///
    /// Connection state is established lazily on first use and reused afterwards.
    ///
    /// # Errors
    /// - `ConnectorError::Connection` if the backend is unreachable
    /// - `ConnectorError::Query` if the query is malformed for this backend
    /// - `ConnectorError::RateLimited` if the backend is throttling
    async fn execute_query(
        &self,
        query_string: &str,
        time_range: &TimeRange,
        max_results: usize,
    ) -> Result<Vec<Record>, ConnectorError>;
}

/// Built-in backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    /// Splunk search
    Splunk,
    /// Elasticsearch
    Elastic,
    /// Generic REST API
    RestApi,
}

impl BackendKind {
    /// Every built-in kind
    pub const ALL: [Self; 3] = [Self::Splunk, Self::Elastic, Self::RestApi];

    /// Registry key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Splunk => "splunk",
            Self::Elastic => "elastic",
            Self::RestApi => "rest_api",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| ConnectorError::UnsupportedBackend(s.to_string()))
    }
}
