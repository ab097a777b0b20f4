//! Hunt workflow
//!
//! Hypothesis → drafted plan → critique → analyst approval → execution →
//! analysis. The coordinator owns the order of these stages; drafting,
//! critique and analysis are pluggable and optional, decided at construction.

use crate::engine::ExecutionEngine;
use crate::error::WorkflowError;
use crate::generators::{CritiqueGenerator, PlanGenerator, ResultAnalyzer};
use crate::store::{InMemoryPlanStore, PlanStore};
use chrono::{DateTime, Utc};
use seeker_core::{CritiqueMerger, ExecutionResult, Plan, PlanError, QueryApproval, SeekerConfig};
use seeker_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Execution result plus downstream analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntReport {
    /// Aggregated execution result
    pub result: ExecutionResult,
    /// Analyzer output, when an analyzer is configured and succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
    /// When the analysis completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
    /// Analyzer failure; the execution result is still reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

/// Drives a hunt through its stages
pub struct HuntCoordinator {
    engine: ExecutionEngine,
    store: Arc<dyn PlanStore>,
    planner: Option<Arc<dyn PlanGenerator>>,
    critic: Option<Arc<dyn CritiqueGenerator>>,
    analyzer: Option<Arc<dyn ResultAnalyzer>>,
    intel_retry: RetryPolicy,
    max_queries_per_plan: usize,
    merger: CritiqueMerger,
}

impl HuntCoordinator {
    /// Create coordinator with an in-memory plan store and no generators
    #[must_use]
    pub fn new(engine: ExecutionEngine, config: &SeekerConfig) -> Self {
        Self {
            engine,
            store: Arc::new(InMemoryPlanStore::new()),
            planner: None,
            critic: None,
            analyzer: None,
            intel_retry: RetryPolicy::new(config.intel_retry.clone()),
            max_queries_per_plan: config.max_queries_per_plan,
            merger: CritiqueMerger::new(),
        }
    }

    /// With plan store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PlanStore>) -> Self {
        self.store = store;
        self
    }

    /// With plan generator
    #[inline]
    #[must_use]
    pub fn with_plan_generator(mut self, planner: Arc<dyn PlanGenerator>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// With critique generator
    #[inline]
    #[must_use]
    pub fn with_critique_generator(mut self, critic: Arc<dyn CritiqueGenerator>) -> Self {
        self.critic = Some(critic);
        self
    }

    /// With result analyzer
    #[inline]
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ResultAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Get execution engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Draft, review and store a plan for `hypothesis`
    ///
    /// Drafts longer than `max_queries_per_plan` are truncated. When a critique
    /// generator is configured the stored plan carries its critique.
    ///
    /// # Errors
    /// - `WorkflowError::Plan` for a blank hypothesis or duplicate query IDs
    /// - `WorkflowError::CapabilityAbsent` without a plan generator
    /// - `WorkflowError::Generator` if drafting or critique fails after retries
    /// - `WorkflowError::Critique` if the critique is malformed
    pub async fn create_plan(
        &self,
        hypothesis: &str,
        analyst_id: &str,
        context: Option<&str>,
    ) -> Result<Plan, WorkflowError> {
        if hypothesis.trim().is_empty() {
            return Err(PlanError::EmptyHypothesis.into());
        }
        let planner = self
            .planner
            .as_ref()
            .ok_or(WorkflowError::CapabilityAbsent("plan generator"))?;

        let mut queries = self
            .intel_retry
            .run(|| planner.generate(hypothesis, context))
            .await
            .map_err(|e| WorkflowError::generator("plan generation", e))?;

        if queries.len() > self.max_queries_per_plan {
            tracing::warn!(
                drafted = queries.len(),
                kept = self.max_queries_per_plan,
                "Truncating drafted plan"
            );
            queries.truncate(self.max_queries_per_plan);
        }

        let mut plan = Plan::new(hypothesis, analyst_id, queries)?;
        if let Some(critic) = &self.critic {
            plan = self.review(plan, critic.as_ref()).await?;
        }
        self.store.put(plan.clone()).await.map_err(WorkflowError::Store)?;

        tracing::info!(
            plan_id = %plan.plan_id,
            queries = plan.queries.len(),
            critiqued = plan.critique.is_some(),
            "Plan created"
        );
        Ok(plan)
    }

    /// Critique a stored plan again and store the result
    ///
    /// # Errors
    /// - `WorkflowError::CapabilityAbsent` without a critique generator
    /// - `WorkflowError::PlanNotFound` for an unknown plan
    /// - `WorkflowError::Generator` or `WorkflowError::Critique` as in [`HuntCoordinator::create_plan`]
    pub async fn critique_plan(&self, plan_id: Uuid) -> Result<Plan, WorkflowError> {
        let critic = self
            .critic
            .as_ref()
            .ok_or(WorkflowError::CapabilityAbsent("critique generator"))?;
        let plan = self.plan(plan_id).await?;
        let plan = self.review(plan, critic.as_ref()).await?;
        self.store.put(plan.clone()).await.map_err(WorkflowError::Store)?;
        Ok(plan)
    }

    /// Fetch a stored plan
    ///
    /// # Errors
    /// `WorkflowError::PlanNotFound` if nothing is stored under `plan_id`.
    pub async fn plan(&self, plan_id: Uuid) -> Result<Plan, WorkflowError> {
        self.store
            .get(plan_id)
            .await
            .map_err(WorkflowError::Store)?
            .ok_or(WorkflowError::PlanNotFound(plan_id))
    }

    /// Store an externally built plan
    ///
    /// # Errors
    /// `WorkflowError::Plan` if the plan violates its invariants.
    pub async fn submit_plan(&self, plan: Plan) -> Result<(), WorkflowError> {
        plan.validate()?;
        self.store.put(plan).await.map_err(WorkflowError::Store)
    }

    /// Execute an approval and analyze the result
    ///
    /// A failing analyzer does not discard the execution: the report carries
    /// the result and `analysis_error`.
    ///
    /// # Errors
    /// - `WorkflowError::PlanNotFound` for an unknown plan
    /// - `WorkflowError::Engine` on infrastructure faults
    pub async fn execute(&self, approval: &QueryApproval) -> Result<HuntReport, WorkflowError> {
        let plan = self.plan(approval.plan_id).await?;
        let result = self.engine.execute_approval(&plan, approval).await?;

        let mut report = HuntReport {
            result,
            analysis: None,
            analyzed_at: None,
            analysis_error: None,
        };

        if let Some(analyzer) = &self.analyzer {
            let digest = report.result.digest();
            let result = &report.result;
            let analysis = self
                .intel_retry
                .run(|| analyzer.analyze(&plan.hypothesis, result, &digest))
                .await;
            match analysis {
                Ok(value) => {
                    report.analysis = Some(value);
                    report.analyzed_at = Some(Utc::now());
                }
                Err(e) => {
                    tracing::warn!(plan_id = %plan.plan_id, error = %format!("{e:#}"), "Analysis failed");
                    report.analysis_error = Some(format!("{e:#}"));
                }
            }
        }
        Ok(report)
    }

    async fn review(&self, plan: Plan, critic: &dyn CritiqueGenerator) -> Result<Plan, WorkflowError> {
        let raw = self
            .intel_retry
            .run(|| critic.critique(&plan))
            .await
            .map_err(|e| WorkflowError::generator("plan critique", e))?;
        Ok(self.merger.merge_json(plan, &raw)?)
    }
}

impl std::fmt::Debug for HuntCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuntCoordinator")
            .field("engine", &self.engine)
            .field("planner", &self.planner.is_some())
            .field("critic", &self.critic.is_some())
            .field("analyzer", &self.analyzer.is_some())
            .field("max_queries_per_plan", &self.max_queries_per_plan)
            .finish_non_exhaustive()
    }
}
