//! Threat-Seeker Engine
//!
//! Concurrent, failure-tolerant execution of analyst-approved hunt queries,
//! and the workflow that leads up to it.
//!
//! # Example
//!
//! ```rust,ignore
//! use seeker_connectors::ConnectorRegistry;
//! use seeker_core::{QueryApproval, SeekerConfig};
//! use seeker_engine::ExecutionEngine;
//!
//! let config = SeekerConfig::default();
//! let engine = ExecutionEngine::new(ConnectorRegistry::from_config(&config), &config)?;
//! let result = engine.execute_approval(&plan, &QueryApproval::all(&plan)).await?;
//! println!("{}", result.digest());
//! ```

#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod generators;
pub mod store;
pub mod workflow;

pub use engine::ExecutionEngine;
pub use error::{EngineError, WorkflowError};
pub use generators::{CritiqueGenerator, PlanGenerator, ResultAnalyzer};
pub use store::{InMemoryPlanStore, PlanStore};
pub use workflow::{HuntCoordinator, HuntReport};
