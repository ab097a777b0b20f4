//! Critique merging
//!
//! An external reviewer produces a [`CritiqueSummary`] for a plan. The
//! [`CritiqueMerger`] folds it back into the plan by query ID so that every
//! query ends up with exactly one critique entry.

use crate::error::CritiqueError;
use crate::types::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Feedback used for queries the reviewer did not mention
pub const DEFAULT_FEEDBACK: &str = "No specific feedback for this query.";

/// How urgent a piece of feedback is
///
/// Parsing is case-insensitive. Words outside the three levels, and `null`,
/// read as [`Severity::Low`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    #[default]
    Low,
    /// Should be addressed
    Medium,
    /// Must be addressed before execution
    High,
}

impl Severity {
    fn from_word(word: &str) -> Self {
        match word.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            other => {
                tracing::warn!(severity = other, "Unknown critique severity, using low");
                Self::Low
            }
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let word = Option::<String>::deserialize(deserializer)?;
        Ok(word.as_deref().map_or(Self::Low, Self::from_word))
    }
}

/// Critique attached to one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCritique {
    /// Reviewer feedback
    pub feedback: String,
    /// Suggested rewrite or change
    pub suggested_modifications: String,
    /// Urgency
    pub severity: Severity,
}

impl Default for QueryCritique {
    fn default() -> Self {
        Self {
            feedback: DEFAULT_FEEDBACK.to_string(),
            suggested_modifications: String::new(),
            severity: Severity::Low,
        }
    }
}

/// Critique as produced by the external reviewer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CritiqueSummary {
    /// Overall assessment of the plan
    pub overall_assessment: String,
    /// Detection opportunities the plan misses
    pub missing_detection_opportunities: Vec<String>,
    /// Additional data sources worth querying
    pub additional_data_sources: Vec<String>,
    /// Per-query feedback keyed by query ID
    pub per_query: BTreeMap<String, QueryCritique>,
}

impl CritiqueSummary {
    /// Parse the reviewer's JSON payload
    ///
    /// The payload carries per-query entries as a `query_critiques` list:
    ///
    /// ```json
    /// {
    ///   "query_critiques": [
    ///     {"query_id": "q1", "critique": "...", "suggested_modifications": "...", "critique_severity": "high"}
    ///   ],
    ///   "overall_assessment": "...",
    ///   "missing_detection_opportunities": [],
    ///   "additional_data_sources": []
    /// }
    /// ```
    ///
    /// Missing fields default to empty. An empty object is a valid, empty critique.
    ///
    /// # Errors
    /// `CritiqueError::Malformed` if the text is not JSON or does not match the shape.
    pub fn from_json(payload: &str) -> Result<Self, CritiqueError> {
        let wire: WireCritique = serde_json::from_str(payload)?;
        Ok(wire.into())
    }

    /// Parse from an already-decoded JSON value
    ///
    /// # Errors
    /// Same as [`CritiqueSummary::from_json`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, CritiqueError> {
        let wire: WireCritique = serde_json::from_value(value)?;
        Ok(wire.into())
    }
}

#[derive(Debug, Deserialize)]
struct WireCritique {
    #[serde(default)]
    query_critiques: Vec<WireQueryCritique>,
    #[serde(default)]
    overall_assessment: String,
    #[serde(default)]
    missing_detection_opportunities: Vec<String>,
    #[serde(default)]
    additional_data_sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireQueryCritique {
    query_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    critique: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    suggested_modifications: String,
    #[serde(default)]
    critique_severity: Severity,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<WireCritique> for CritiqueSummary {
    fn from(wire: WireCritique) -> Self {
        let mut per_query = BTreeMap::new();
        for entry in wire.query_critiques {
            // Later entries for the same ID replace earlier ones
            per_query.insert(
                entry.query_id,
                QueryCritique {
                    feedback: entry.critique,
                    suggested_modifications: entry.suggested_modifications,
                    severity: entry.critique_severity,
                },
            );
        }
        Self {
            overall_assessment: wire.overall_assessment,
            missing_detection_opportunities: wire.missing_detection_opportunities,
            additional_data_sources: wire.additional_data_sources,
            per_query,
        }
    }
}

/// Critique as attached to a plan after merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCritique {
    /// Overall assessment of the plan
    pub overall_assessment: String,
    /// Detection opportunities the plan misses
    pub missing_detection_opportunities: Vec<String>,
    /// Additional data sources worth querying
    pub additional_data_sources: Vec<String>,
    /// One entry per plan query
    pub per_query: BTreeMap<String, QueryCritique>,
    /// Merge timestamp
    pub critiqued_at: DateTime<Utc>,
}

impl PlanCritique {
    /// Highest severity across all queries
    #[must_use]
    pub fn max_severity(&self) -> Severity {
        self.per_query
            .values()
            .map(|c| c.severity)
            .max()
            .unwrap_or_default()
    }
}

/// Merges reviewer critiques into plans
#[derive(Debug, Clone, Copy, Default)]
pub struct CritiqueMerger;

impl CritiqueMerger {
    /// Create new merger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Attach a critique to a plan
    ///
    /// Every plan query gets the reviewer's entry when present, otherwise the
    /// default low-severity entry. Entries for IDs not in the plan are dropped.
    /// Queries themselves are left untouched.
    #[must_use]
    pub fn merge(&self, mut plan: Plan, critique: CritiqueSummary) -> Plan {
        let CritiqueSummary {
            overall_assessment,
            missing_detection_opportunities,
            additional_data_sources,
            mut per_query,
        } = critique;

        let merged: BTreeMap<String, QueryCritique> = plan
            .queries
            .iter()
            .map(|q| {
                let entry = per_query.remove(&q.query_id).unwrap_or_default();
                (q.query_id.clone(), entry)
            })
            .collect();

        if !per_query.is_empty() {
            tracing::debug!(
                plan_id = %plan.plan_id,
                unmatched = per_query.len(),
                "Dropping critique entries for unknown query ids"
            );
        }

        plan.critique = Some(PlanCritique {
            overall_assessment,
            missing_detection_opportunities,
            additional_data_sources,
            per_query: merged,
            critiqued_at: Utc::now(),
        });
        plan
    }

    /// Parse a raw reviewer payload and merge it
    ///
    /// # Errors
    /// `CritiqueError::Malformed` if the payload cannot be parsed.
    pub fn merge_json(&self, plan: Plan, payload: &str) -> Result<Plan, CritiqueError> {
        let critique = CritiqueSummary::from_json(payload)?;
        Ok(self.merge(plan, critique))
    }
}
