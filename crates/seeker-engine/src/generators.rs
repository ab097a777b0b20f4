//! External intelligence capabilities
//!
//! Plan drafting, plan critique and result analysis are produced outside
//! this workspace (typically by a language model). Their failures are opaque,
//! so they report `anyhow` errors; throttling messages are recognized and
//! retried by the coordinator.

use seeker_core::{ExecutionResult, Plan, Query};

/// Drafts queries for a hypothesis
#[async_trait::async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Draft queries; plan identity and timestamps are assigned by the caller
    async fn generate(&self, hypothesis: &str, context: Option<&str>) -> anyhow::Result<Vec<Query>>;
}

/// Reviews a plan
#[async_trait::async_trait]
pub trait CritiqueGenerator: Send + Sync {
    /// Raw critique JSON (`query_critiques`, `overall_assessment`, ...)
    async fn critique(&self, plan: &Plan) -> anyhow::Result<String>;
}

/// Summarizes an execution for the analyst
#[async_trait::async_trait]
pub trait ResultAnalyzer: Send + Sync {
    /// Analyze `result`; `digest` is its rendered text form
    async fn analyze(
        &self,
        hypothesis: &str,
        result: &ExecutionResult,
        digest: &str,
    ) -> anyhow::Result<serde_json::Value>;
}
