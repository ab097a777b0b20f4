//! Result aggregation
//!
//! Folds per-query outcomes into the [`ExecutionResult`] envelope. Counters are
//! always recomputed from the outcomes themselves.

use crate::types::{ExecutionResult, ExecutionSummary, QueryOutcome};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Builds execution results from outcome lists
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Create new aggregator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Assemble the result envelope
    ///
    /// `execution_start` is the instant the engine began dispatch; it is passed
    /// through untouched. A fresh `result_id` is generated on every call.
    #[must_use]
    pub fn aggregate(
        &self,
        plan_id: Uuid,
        execution_start: DateTime<Utc>,
        outcomes: Vec<QueryOutcome>,
    ) -> ExecutionResult {
        let summary = ExecutionSummary::from_outcomes(&outcomes);
        ExecutionResult {
            result_id: Uuid::new_v4(),
            plan_id,
            execution_start,
            outcomes,
            summary,
            cancelled: false,
        }
    }

    /// Assemble a result from the outcomes that arrived before cancellation
    #[must_use]
    pub fn aggregate_partial(
        &self,
        plan_id: Uuid,
        execution_start: DateTime<Utc>,
        outcomes: Vec<QueryOutcome>,
    ) -> ExecutionResult {
        ExecutionResult {
            cancelled: true,
            ..self.aggregate(plan_id, execution_start, outcomes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn outcome(id: usize, success: bool, records: usize) -> QueryOutcome {
        let now = Utc::now();
        if success {
            QueryOutcome::success(
                format!("q{id}"),
                "splunk",
                (0..records).map(|i| json!({ "i": i })).collect(),
                now,
                now,
            )
        } else {
            QueryOutcome::failure(format!("q{id}"), "splunk", "failed", now, now)
        }
    }

    #[test]
    fn aggregate_passes_start_through() {
        let start = Utc::now() - chrono::Duration::seconds(30);
        let plan_id = Uuid::new_v4();
        let result = ResultAggregator::new().aggregate(plan_id, start, vec![outcome(1, true, 3)]);
        assert_eq!(result.execution_start, start);
        assert_eq!(result.plan_id, plan_id);
        assert_eq!(result.summary.total_records, 3);
        assert!(!result.cancelled);
    }

    #[test]
    fn aggregate_generates_fresh_ids() {
        let aggregator = ResultAggregator::new();
        let plan_id = Uuid::new_v4();
        let now = Utc::now();
        let a = aggregator.aggregate(plan_id, now, Vec::new());
        let b = aggregator.aggregate(plan_id, now, Vec::new());
        assert_ne!(a.result_id, b.result_id);
        assert_eq!(a.summary, ExecutionSummary::default());
    }

    #[test]
    fn partial_is_flagged() {
        let result = ResultAggregator::new().aggregate_partial(Uuid::new_v4(), Utc::now(), vec![outcome(1, false, 0)]);
        assert!(result.cancelled);
        assert_eq!(result.summary.failed_queries, 1);
    }

    proptest! {
        #[test]
        fn summary_invariants_hold(cases in proptest::collection::vec((any::<bool>(), 0usize..20), 0..40)) {
            let outcomes: Vec<QueryOutcome> = cases
                .iter()
                .enumerate()
                .map(|(i, (ok, n))| outcome(i, *ok, *n))
                .collect();
            let expected_records: usize = cases.iter().filter(|(ok, _)| *ok).map(|(_, n)| n).sum();

            let result = ResultAggregator::new().aggregate(Uuid::new_v4(), Utc::now(), outcomes);

            prop_assert_eq!(result.summary.total_queries, result.outcomes.len());
            prop_assert_eq!(
                result.summary.successful_queries + result.summary.failed_queries,
                result.summary.total_queries
            );
            prop_assert_eq!(result.summary.total_records, expected_records);
        }
    }
}
