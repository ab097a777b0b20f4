//! Plan storage boundary
//!
//! Plans live in an external key-value store between creation, critique and
//! approval. [`InMemoryPlanStore`] backs tests and the single-process CLI.

use dashmap::DashMap;
use seeker_core::Plan;
use uuid::Uuid;

/// Key-value storage for plans
#[async_trait::async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert or replace a plan
    async fn put(&self, plan: Plan) -> anyhow::Result<()>;

    /// Fetch a plan
    async fn get(&self, plan_id: Uuid) -> anyhow::Result<Option<Plan>>;
}

/// Process-local plan store
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: DashMap<Uuid, Plan>,
}

impl InMemoryPlanStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored plans
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[async_trait::async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn put(&self, plan: Plan) -> anyhow::Result<()> {
        self.plans.insert(plan.plan_id, plan);
        Ok(())
    }

    async fn get(&self, plan_id: Uuid) -> anyhow::Result<Option<Plan>> {
        Ok(self.plans.get(&plan_id).map(|entry| entry.value().clone()))
    }
}
