//! Error types for the engine and the hunt workflow
//!
//! Per-query failures are never errors here: they become error outcomes on
//! the [`ExecutionResult`](seeker_core::ExecutionResult). Only faults that
//! concern the whole run escape.

use seeker_core::{ConfigError, CritiqueError, PlanError};
use uuid::Uuid;

/// Infrastructure faults that abort an execution
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A query task ended without reporting an outcome
    #[error("query task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Engine configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Hunt workflow errors
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Optional capability was not configured
    #[error("{0} is not configured")]
    CapabilityAbsent(&'static str),

    /// No stored plan with this ID
    #[error("plan not found: {0}")]
    PlanNotFound(Uuid),

    /// Plan invariant violated
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Critique could not be parsed
    #[error(transparent)]
    Critique(#[from] CritiqueError),

    /// Execution aborted
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Plan store failed
    #[error("plan store failed: {0:#}")]
    Store(#[source] anyhow::Error),

    /// External generator failed after retries
    #[error("{stage} failed: {source:#}")]
    Generator {
        /// Workflow stage
        stage: &'static str,
        /// Generator error
        #[source]
        source: anyhow::Error,
    },
}

impl WorkflowError {
    /// Wrap a generator failure
    #[inline]
    pub fn generator(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Generator { stage, source }
    }

    /// Check if the failure came from caller input rather than a fault
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PlanNotFound(_) | Self::Plan(_) | Self::CapabilityAbsent(_)
        )
    }
}
