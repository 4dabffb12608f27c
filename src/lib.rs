//! Patrol Agent - inspection task orchestration
//!
//! Runs inspection tasks made of heterogeneous items against pluggable
//! executors. Tasks are admitted through a bounded pool, run under a
//! deadline-bound cancellable context, tracked in an evicting store and
//! reported through completion callbacks.
//!
//! ```no_run
//! use std::sync::Arc;
//! use patrol_agent::backend::{ExecutorRegistry, MockExecutor};
//! use patrol_agent::executor::{OrchestratorConfig, TaskOrchestrator};
//! use patrol_agent::types::TaskItem;
//!
//! # async fn demo() -> patrol_agent::error::Result<()> {
//! let registry = ExecutorRegistry::new();
//! registry.register(Arc::new(MockExecutor::named("metrics")));
//!
//! let orchestrator = TaskOrchestrator::new(OrchestratorConfig::default(), Arc::new(registry));
//! orchestrator.submit("t1", vec![TaskItem::new(1, "cpu", "metrics")], 30)?;
//! let task = orchestrator.get_status("t1")?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod types;
pub mod version;
