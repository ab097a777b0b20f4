//! Testing utilities for the Threat-Seeker workspace
//!
//! Scripted connectors, plan fixtures and configuration presets.

#![allow(missing_docs)]

use parking_lot::Mutex;
use seeker_connectors::{Connector, ConnectorError, ConnectorRegistry};
use seeker_core::{Plan, Query, Record, SeekerConfig, TimeRange};
use seeker_resilience::RetryConfig;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// What a scripted connector does once its queued failures are used up
#[derive(Debug, Clone)]
pub enum Behavior {
    Return(usize),
    Fail(ConnectorError),
    Panic,
}

/// Connector driven by a script, recording every call
#[derive(Debug)]
pub struct ScriptedConnector {
    behavior: Behavior,
    delay: Duration,
    queued: Mutex<VecDeque<ConnectorError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn returning(records: usize) -> Self {
        Self::with_behavior(Behavior::Return(records))
    }

    pub fn failing(error: ConnectorError) -> Self {
        Self::with_behavior(Behavior::Fail(error))
    }

    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            queued: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first calls with these errors, in order
    #[must_use]
    pub fn failing_first(self, errors: impl IntoIterator<Item = ConnectorError>) -> Self {
        self.queued.lock().extend(errors);
        self
    }

    /// Throttle the first `n` calls
    #[must_use]
    pub fn rate_limited_first(self, n: usize) -> Self {
        self.failing_first((0..n).map(|_| ConnectorError::rate_limited("429 rate limit exceeded")))
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Query strings received, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn execute_query(
        &self,
        query_string: &str,
        _time_range: &TimeRange,
        max_results: usize,
    ) -> Result<Vec<Record>, ConnectorError> {
        self.calls.lock().push(query_string.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.queued.lock().pop_front() {
            return Err(err);
        }
        match &self.behavior {
            Behavior::Return(n) => Ok((0..(*n).min(max_results))
                .map(|i| json!({"n": i, "query": query_string}))
                .collect()),
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Panic => panic!("scripted connector panic"),
        }
    }
}

/// Registry over the given connectors
pub fn registry_with(entries: &[(&str, Arc<ScriptedConnector>)]) -> ConnectorRegistry {
    entries.iter().fold(ConnectorRegistry::new(), |registry, (kind, connector)| {
        registry.with(kind, connector.clone() as Arc<dyn Connector>)
    })
}

/// Configuration with fast, deterministic retries
pub fn test_config() -> SeekerConfig {
    SeekerConfig::default()
        .with_retry(
            RetryConfig::default()
                .with_max_retries(3)
                .with_initial_delay(Duration::from_millis(10))
                .with_max_delay(Duration::from_secs(1))
                .with_jitter(false),
        )
        .with_query_timeout(None)
}

/// Plan over `(query_id, backend_kind)` pairs
pub fn plan_with(queries: &[(&str, &str)]) -> Plan {
    Plan::new(
        "Adversary uses WMI for lateral movement",
        "analyst-1",
        queries
            .iter()
            .map(|(id, kind)| Query::new(*id, *kind, format!("search for {id}")))
            .collect(),
    )
    .unwrap()
}

/// Three-query plan: `q1` splunk, `q2` elastic, `q3` on an unregistered backend
pub fn sample_plan() -> Plan {
    plan_with(&[("q1", "splunk"), ("q2", "elastic"), ("q3", "unknown")])
}

/// Install a test-writer subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
