//! Core types for Threat-Seeker
//!
//! Defines the structures that flow through a hunt:
//! - Queries and the plans that group them
//! - Analyst approvals (query subset plus string overrides)
//! - Per-query outcomes and the aggregated execution result

use crate::critique::{PlanCritique, QueryCritique};
use crate::error::PlanError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Opaque backend record. The engine only counts and forwards these.
pub type Record = serde_json::Value;

/// Default relative start bound when a query omits its time range
pub const DEFAULT_RANGE_START: &str = "-24h";

/// Default end bound when a query omits its time range
pub const DEFAULT_RANGE_END: &str = "now";

/// Textual time window, interpreted by the connector (`"-24h"`, `"now"`, ISO-8601)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start bound
    pub start: String,
    /// End bound
    pub end: String,
}

impl TimeRange {
    /// Create new time range
    #[inline]
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new(DEFAULT_RANGE_START, DEFAULT_RANGE_END)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A single backend query inside a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Identifier, unique within its plan
    pub query_id: String,
    /// Backend kind identifier (`splunk`, `elastic`, `rest_api`, ...)
    #[serde(alias = "data_source")]
    pub backend_kind: String,
    /// Backend-native query text
    pub query_string: String,
    /// Time window
    #[serde(default)]
    pub time_range: TimeRange,
    /// Natural language explanation of what the query looks for
    #[serde(default)]
    pub explanation: String,
    /// MITRE ATT&CK technique identifiers
    #[serde(default, alias = "technique_ids")]
    pub technique_refs: BTreeSet<String>,
    /// Expected volume of results (`high`, `medium`, `low`)
    #[serde(default)]
    pub expected_volume: String,
    /// Risk level if the query returns results
    #[serde(default)]
    pub risk_level: String,
}

impl Query {
    /// Create new query with default time range and empty metadata
    #[inline]
    #[must_use]
    pub fn new(
        query_id: impl Into<String>,
        backend_kind: impl Into<String>,
        query_string: impl Into<String>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            backend_kind: backend_kind.into(),
            query_string: query_string.into(),
            time_range: TimeRange::default(),
            explanation: String::new(),
            technique_refs: BTreeSet::new(),
            expected_volume: String::new(),
            risk_level: String::new(),
        }
    }

    /// With time range
    #[inline]
    #[must_use]
    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    /// With explanation
    #[inline]
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// With a technique reference
    #[inline]
    #[must_use]
    pub fn with_technique(mut self, technique: impl Into<String>) -> Self {
        self.technique_refs.insert(technique.into());
        self
    }

    /// With expected volume and risk level
    #[inline]
    #[must_use]
    pub fn with_assessment(
        mut self,
        expected_volume: impl Into<String>,
        risk_level: impl Into<String>,
    ) -> Self {
        self.expected_volume = expected_volume.into();
        self.risk_level = risk_level.into();
        self
    }

    /// Query text to submit, honoring an approval-time override
    #[must_use]
    pub fn effective_query_string<'a>(&'a self, modifications: &'a HashMap<String, String>) -> &'a str {
        modifications
            .get(&self.query_id)
            .map_or(self.query_string.as_str(), String::as_str)
    }
}

/// Structured hunt plan derived from an analyst hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier
    pub plan_id: Uuid,
    /// Original hypothesis text
    pub hypothesis: String,
    /// Ordered queries
    pub queries: Vec<Query>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Analyst who submitted the hypothesis
    pub analyst_id: String,
    /// Merged critique, if the plan has been reviewed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<PlanCritique>,
}

impl Plan {
    /// Create new plan, enforcing query ID uniqueness
    ///
    /// # Errors
    /// - `PlanError::EmptyHypothesis` if the hypothesis is blank
    /// - `PlanError::DuplicateQueryId` if two queries share an ID
    pub fn new(
        hypothesis: impl Into<String>,
        analyst_id: impl Into<String>,
        queries: Vec<Query>,
    ) -> Result<Self, PlanError> {
        let plan = Self {
            plan_id: Uuid::new_v4(),
            hypothesis: hypothesis.into(),
            queries,
            created_at: Utc::now(),
            analyst_id: analyst_id.into(),
            critique: None,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Check structural invariants
    ///
    /// # Errors
    /// Same as [`Plan::new`].
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.hypothesis.trim().is_empty() {
            return Err(PlanError::EmptyHypothesis);
        }
        let mut seen = HashSet::with_capacity(self.queries.len());
        for query in &self.queries {
            if !seen.insert(query.query_id.as_str()) {
                return Err(PlanError::DuplicateQueryId(query.query_id.clone()));
            }
        }
        Ok(())
    }

    /// Find query by ID
    #[must_use]
    pub fn query(&self, query_id: &str) -> Option<&Query> {
        self.queries.iter().find(|q| q.query_id == query_id)
    }

    /// Queries whose IDs are in the approval set, in plan order
    pub fn approved<'a>(&'a self, approved: &'a HashSet<String>) -> impl Iterator<Item = &'a Query> + 'a {
        self.queries
            .iter()
            .filter(move |q| approved.contains(&q.query_id))
    }

    /// Critique attached to a query, if the plan has been reviewed
    #[must_use]
    pub fn critique_for(&self, query_id: &str) -> Option<&QueryCritique> {
        self.critique.as_ref().and_then(|c| c.per_query.get(query_id))
    }
}

/// Analyst approval of a subset of a plan's queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryApproval {
    /// Plan being approved
    pub plan_id: Uuid,
    /// Approved query IDs (order and duplicates are irrelevant)
    pub query_ids: HashSet<String>,
    /// Query string overrides keyed by query ID
    #[serde(default)]
    pub modifications: HashMap<String, String>,
}

impl QueryApproval {
    /// Create approval for the given IDs
    #[must_use]
    pub fn new<I, S>(plan_id: Uuid, query_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            plan_id,
            query_ids: query_ids.into_iter().map(Into::into).collect(),
            modifications: HashMap::new(),
        }
    }

    /// Approve every query in a plan
    #[must_use]
    pub fn all(plan: &Plan) -> Self {
        Self::new(plan.plan_id, plan.queries.iter().map(|q| q.query_id.clone()))
    }

    /// With a query string override
    #[inline]
    #[must_use]
    pub fn with_modification(
        mut self,
        query_id: impl Into<String>,
        query_string: impl Into<String>,
    ) -> Self {
        self.modifications.insert(query_id.into(), query_string.into());
        self
    }
}

/// Outcome status of a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Connector returned records
    Success,
    /// Query failed (unsupported backend, connector error, exhausted retries, timeout)
    Error,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Result of one execution attempt for one approved query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Query identifier
    pub query_id: String,
    /// Backend kind as written in the plan
    pub backend_kind: String,
    /// Success or error
    pub status: OutcomeStatus,
    /// Records (empty on error)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Record>,
    /// Number of records returned (zero on error)
    pub record_count: usize,
    /// Error message (error only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Dispatch timestamp
    pub started_at: DateTime<Utc>,
    /// Completion timestamp
    pub finished_at: DateTime<Utc>,
    /// Wall time spent on the query, including retries
    pub elapsed_seconds: f64,
}

impl QueryOutcome {
    /// Successful outcome
    #[must_use]
    pub fn success(
        query_id: impl Into<String>,
        backend_kind: impl Into<String>,
        records: Vec<Record>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            backend_kind: backend_kind.into(),
            status: OutcomeStatus::Success,
            record_count: records.len(),
            records,
            error_message: None,
            started_at,
            finished_at,
            elapsed_seconds: elapsed_seconds(started_at, finished_at),
        }
    }

    /// Failed outcome
    #[must_use]
    pub fn failure(
        query_id: impl Into<String>,
        backend_kind: impl Into<String>,
        error_message: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            backend_kind: backend_kind.into(),
            status: OutcomeStatus::Error,
            records: Vec::new(),
            record_count: 0,
            error_message: Some(error_message.into()),
            started_at,
            finished_at,
            elapsed_seconds: elapsed_seconds(started_at, finished_at),
        }
    }

    /// Check for success
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_seconds(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> f64 {
    let micros = (finished_at - started_at).num_microseconds().unwrap_or(0).max(0);
    micros as f64 / 1_000_000.0
}

/// Summary counters over a set of outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Number of outcomes
    pub total_queries: usize,
    /// Outcomes with `status == success`
    pub successful_queries: usize,
    /// Outcomes with `status == error`
    pub failed_queries: usize,
    /// Sum of record counts over successful outcomes
    pub total_records: usize,
}

impl ExecutionSummary {
    /// Fold outcomes into counters
    #[must_use]
    pub fn from_outcomes(outcomes: &[QueryOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, outcome| {
            acc.total_queries += 1;
            if outcome.is_success() {
                acc.successful_queries += 1;
                acc.total_records += outcome.record_count;
            } else {
                acc.failed_queries += 1;
            }
            acc
        })
    }

    /// Whether every query succeeded
    #[inline]
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed_queries == 0
    }
}

/// Aggregated result of one `execute_plan` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Fresh identifier per execution
    pub result_id: Uuid,
    /// Plan that was executed
    pub plan_id: Uuid,
    /// When the engine began dispatch
    pub execution_start: DateTime<Utc>,
    /// Outcomes in arrival order
    pub outcomes: Vec<QueryOutcome>,
    /// Summary counters derived from `outcomes`
    pub summary: ExecutionSummary,
    /// Set when the run was cancelled before every task reported
    #[serde(default)]
    pub cancelled: bool,
}

impl ExecutionResult {
    /// Find outcome by query ID
    #[must_use]
    pub fn outcome(&self, query_id: &str) -> Option<&QueryOutcome> {
        self.outcomes.iter().find(|o| o.query_id == query_id)
    }

    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
