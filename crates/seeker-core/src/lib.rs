//! Threat-Seeker Core
//!
//! The data model shared by every stage of a hunt:
//! - Plans of backend queries derived from an analyst hypothesis
//! - Analyst approvals with optional query overrides
//! - Per-query outcomes and the aggregated execution result
//! - Critique merging and result aggregation
//! - Configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use seeker_core::{CritiqueMerger, CritiqueSummary, Plan, Query};
//!
//! let plan = Plan::new("WMI lateral movement", "analyst-7", vec![
//!     Query::new("q1", "splunk", "index=wineventlog EventCode=4688 wmic"),
//! ])?;
//! let critique = CritiqueSummary::from_json(raw_reviewer_output)?;
//! let reviewed = CritiqueMerger::new().merge(plan, critique);
//! ```

#![warn(unreachable_pub)]

pub mod aggregate;
pub mod config;
pub mod critique;
pub mod digest;
pub mod error;
pub mod types;

pub use aggregate::ResultAggregator;
pub use config::{ElasticSettings, RestApiSettings, SeekerConfig, SplunkSettings};
pub use critique::{CritiqueMerger, CritiqueSummary, PlanCritique, QueryCritique, Severity};
pub use digest::DigestOptions;
pub use error::{ConfigError, CritiqueError, PlanError};
pub use types::{
    ExecutionResult, ExecutionSummary, OutcomeStatus, Plan, Query, QueryApproval, QueryOutcome,
    Record, TimeRange,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
