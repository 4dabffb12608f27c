//! Executor trait definitions
//!
//! Defines the `Executor` trait every inspection backend implements.

use async_trait::async_trait;

use crate::error::Result;
use crate::executor::ExecutionContext;
use crate::types::{ExecutionResult, TaskItem};

/// Capability contract for a backend that can run one task item
///
/// Implementations must be safe for concurrent use from many tasks and
/// should return promptly once `ctx.done()` resolves. Returning `Err`
/// fails only the item, never the task; the orchestrator fills in the
/// item id and duration of the returned result.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Registry key; items select this executor through their `type`
    fn name(&self) -> &str;

    /// Run one item under the given context
    async fn execute(&self, ctx: &ExecutionContext, item: &TaskItem) -> Result<ExecutionResult>;
}
