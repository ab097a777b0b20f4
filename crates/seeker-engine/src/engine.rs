//! Execution engine
//!
//! Fans the approved queries of a plan out to their connectors as independent
//! tasks and folds whatever comes back into one [`ExecutionResult`].
//!
//! # Failure isolation
//!
//! Every task reports exactly one [`QueryOutcome`]. Unsupported backends,
//! connector errors, exhausted rate-limit retries, timeouts and connector
//! panics all become error outcomes. A slow or failing query never delays or
//! fails its siblings; the only errors returned to the caller are
//! infrastructure faults ([`EngineError`]).

use crate::error::EngineError;
use chrono::Utc;
use futures::FutureExt;
use seeker_connectors::{Connector, ConnectorError, ConnectorRegistry};
use seeker_core::{
    ExecutionResult, Plan, QueryApproval, QueryOutcome, Record, ResultAggregator, SeekerConfig,
    TimeRange,
};
use seeker_resilience::RetryPolicy;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Concurrent query executor
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    registry: Arc<ConnectorRegistry>,
    retry: RetryPolicy,
    aggregator: ResultAggregator,
    max_results: usize,
    max_concurrent: usize,
    query_timeout: Option<Duration>,
}

impl ExecutionEngine {
    /// Create engine over a connector registry
    ///
    /// # Errors
    /// `EngineError::Config` if the configuration fails validation.
    pub fn new(registry: ConnectorRegistry, config: &SeekerConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(registry),
            retry: RetryPolicy::new(config.retry.clone()),
            aggregator: ResultAggregator::new(),
            max_results: config.max_results_per_query,
            max_concurrent: config.max_concurrent_queries,
            query_timeout: config.query_timeout(),
        })
    }

    /// Get connector registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    /// Run the approved queries of `plan` and wait for all of them
    ///
    /// Queries whose ID is not in `approved` are skipped; approved IDs that are
    /// not in the plan are ignored. `modifications` replaces query strings by ID.
    ///
    /// # Errors
    /// `EngineError::TaskJoin` if a task dies without reporting an outcome.
    pub async fn execute_plan(
        &self,
        plan: &Plan,
        approved: &HashSet<String>,
        modifications: &HashMap<String, String>,
    ) -> Result<ExecutionResult, EngineError> {
        self.execute_plan_until(plan, approved, modifications, std::future::pending())
            .await
    }

    /// Run an analyst approval against its plan
    ///
    /// # Errors
    /// Same as [`ExecutionEngine::execute_plan`].
    pub async fn execute_approval(
        &self,
        plan: &Plan,
        approval: &QueryApproval,
    ) -> Result<ExecutionResult, EngineError> {
        self.execute_plan(plan, &approval.query_ids, &approval.modifications)
            .await
    }

    /// Like [`ExecutionEngine::execute_plan`], stopping early when `cancel` resolves
    ///
    /// On cancellation the outcomes that already arrived are aggregated into a
    /// result with `cancelled` set, and every in-flight task is aborted.
    ///
    /// # Errors
    /// Same as [`ExecutionEngine::execute_plan`].
    pub async fn execute_plan_until<C>(
        &self,
        plan: &Plan,
        approved: &HashSet<String>,
        modifications: &HashMap<String, String>,
        cancel: C,
    ) -> Result<ExecutionResult, EngineError>
    where
        C: Future<Output = ()>,
    {
        let execution_start = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut outcomes = Vec::new();

        for query in plan.approved(approved) {
            let connector = match self.registry.resolve(&query.backend_kind) {
                Ok(connector) => connector,
                Err(err) => {
                    tracing::warn!(query_id = %query.query_id, backend = %query.backend_kind, "No connector for backend");
                    let now = Utc::now();
                    outcomes.push(QueryOutcome::failure(
                        &query.query_id,
                        &query.backend_kind,
                        err.to_string(),
                        now,
                        now,
                    ));
                    continue;
                }
            };

            let task = QueryTask {
                query_id: query.query_id.clone(),
                backend_kind: query.backend_kind.clone(),
                query_string: query.effective_query_string(modifications).to_string(),
                time_range: query.time_range.clone(),
                connector,
                retry: self.retry.clone(),
                max_results: self.max_results,
                timeout: self.query_timeout,
            };
            let span = tracing::info_span!("query", query_id = %task.query_id, backend = %task.backend_kind);
            let permits = Arc::clone(&semaphore);
            tasks.spawn(
                async move {
                    // The semaphore is never closed, so acquisition only waits.
                    let _permit = permits.acquire_owned().await.ok();
                    task.run().await
                }
                .instrument(span),
            );
        }

        tracing::info!(
            plan_id = %plan.plan_id,
            dispatched = tasks.len(),
            unresolved = outcomes.len(),
            "Executing plan"
        );

        tokio::pin!(cancel);
        let cancelled = loop {
            tokio::select! {
                biased;
                () = &mut cancel => break true,
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(err)) => {
                        tracing::error!(error = %err, "Query task failed");
                        return Err(EngineError::TaskJoin(err));
                    }
                    None => break false,
                },
            }
        };

        let result = if cancelled {
            tracing::warn!(
                plan_id = %plan.plan_id,
                completed = outcomes.len(),
                aborted = tasks.len(),
                "Execution cancelled"
            );
            tasks.abort_all();
            self.aggregator
                .aggregate_partial(plan.plan_id, execution_start, outcomes)
        } else {
            self.aggregator
                .aggregate(plan.plan_id, execution_start, outcomes)
        };

        tracing::info!(
            plan_id = %plan.plan_id,
            result_id = %result.result_id,
            successful = result.summary.successful_queries,
            failed = result.summary.failed_queries,
            records = result.summary.total_records,
            "Execution finished"
        );
        Ok(result)
    }
}

/// Everything one query task owns
struct QueryTask {
    query_id: String,
    backend_kind: String,
    query_string: String,
    time_range: TimeRange,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    max_results: usize,
    timeout: Option<Duration>,
}

enum Attempt {
    Finished(Result<Vec<Record>, ConnectorError>),
    Panicked(String),
    TimedOut(Duration),
}

impl QueryTask {
    async fn run(self) -> QueryOutcome {
        let started_at = Utc::now();
        tracing::debug!(time_range = %self.time_range, "Dispatching query");

        let attempt = {
            let connector = &self.connector;
            let query_string = self.query_string.as_str();
            let time_range = &self.time_range;
            let max_results = self.max_results;
            let call = self.retry.run(|| {
                connector.execute_query(query_string, time_range, max_results)
            });
            let guarded = AssertUnwindSafe(call).catch_unwind();

            let caught = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, guarded).await.ok(),
                None => Some(guarded.await),
            };
            match caught {
                Some(Ok(result)) => Attempt::Finished(result),
                Some(Err(payload)) => Attempt::Panicked(panic_message(&*payload)),
                None => Attempt::TimedOut(self.timeout.unwrap_or_default()),
            }
        };

        let finished_at = Utc::now();
        let failure = |message: String| {
            tracing::warn!(error = %message, "Query failed");
            QueryOutcome::failure(&self.query_id, &self.backend_kind, message, started_at, finished_at)
        };

        match attempt {
            Attempt::Finished(Ok(records)) => {
                tracing::debug!(records = records.len(), "Query succeeded");
                QueryOutcome::success(&self.query_id, &self.backend_kind, records, started_at, finished_at)
            }
            Attempt::Finished(Err(err)) => {
                if err.is_retryable() {
                    tracing::warn!(
                        max_retries = self.retry.config().max_retries,
                        "Rate limit retries exhausted"
                    );
                }
                failure(err.to_string())
            }
            Attempt::Panicked(message) => failure(format!("connector panicked: {message}")),
            Attempt::TimedOut(limit) => {
                failure(format!("query timed out after {}s", limit.as_secs()))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_core::OutcomeStatus;
    use seeker_test_utils::{registry_with, sample_plan, test_config, ScriptedConnector};

    fn all_ids(plan: &Plan) -> HashSet<String> {
        plan.queries.iter().map(|q| q.query_id.clone()).collect()
    }

    #[tokio::test]
    async fn unsupported_backend_does_not_abort_siblings() {
        let registry = registry_with(&[
            ("splunk", ScriptedConnector::returning(3).into_arc()),
            ("elastic", ScriptedConnector::returning(2).into_arc()),
        ]);
        let engine = ExecutionEngine::new(registry, &test_config()).unwrap();
        let plan = sample_plan();

        let result = engine
            .execute_plan(&plan, &all_ids(&plan), &HashMap::new())
            .await
            .unwrap();

        assert_eq!(result.summary.total_queries, 3);
        assert_eq!(result.summary.successful_queries, 2);
        assert_eq!(result.summary.failed_queries, 1);
        assert_eq!(result.summary.total_records, 5);
        let q3 = result.outcome("q3").unwrap();
        assert_eq!(q3.status, OutcomeStatus::Error);
        assert_eq!(q3.error_message.as_deref(), Some("unsupported backend: unknown"));
    }

    #[tokio::test]
    async fn empty_approval_is_an_empty_result() {
        let engine = ExecutionEngine::new(ConnectorRegistry::new(), &test_config()).unwrap();
        let plan = sample_plan();
        let approved: HashSet<String> = ["nope".to_string()].into_iter().collect();

        let result = engine
            .execute_plan(&plan, &approved, &HashMap::new())
            .await
            .unwrap();

        assert!(result.outcomes.is_empty());
        assert_eq!(result.summary.total_queries, 0);
        assert_eq!(result.plan_id, plan.plan_id);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn panicking_connector_becomes_error_outcome() {
        let registry = registry_with(&[
            ("splunk", ScriptedConnector::panicking().into_arc()),
            ("elastic", ScriptedConnector::returning(1).into_arc()),
        ]);
        let engine = ExecutionEngine::new(registry, &test_config()).unwrap();
        let plan = sample_plan();

        let result = engine
            .execute_plan(&plan, &all_ids(&plan), &HashMap::new())
            .await
            .unwrap();

        let q1 = result.outcome("q1").unwrap();
        assert_eq!(
            q1.error_message.as_deref(),
            Some("connector panicked: scripted connector panic")
        );
        assert!(result.outcome("q2").unwrap().is_success());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = test_config().with_max_concurrent_queries(0);
        assert!(matches!(
            ExecutionEngine::new(ConnectorRegistry::new(), &config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
