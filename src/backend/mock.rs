//! Mock executor for testing
//!
//! Deterministic `Executor` for unit tests and dry runs. Behavior comes
//! from `MockConfig` and can be overridden per item through params:
//! `delay_ms`, `status`, `value`, `fail` and `panic`.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::MockSettings;
use crate::error::{Error, Result};
use crate::executor::ExecutionContext;
use crate::types::{ExecutionResult, ResultStatus, TaskItem};

use super::Executor;

// ─────────────────────────────────────────────────────────────────
// Mock Executor Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock executor behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Registry key
    pub name: String,

    /// Simulated work per item (ms)
    pub delay_ms: u64,

    /// Status reported for successful items
    pub status: ResultStatus,

    /// Fixed value reported for successful items
    pub value: String,

    /// Fail every item with this message
    pub fail_with: Option<String>,

    /// Stop sleeping when the context finishes
    pub honor_cancel: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            delay_ms: 0,
            status: ResultStatus::Normal,
            value: "ok".to_string(),
            fail_with: None,
            honor_cancel: true,
        }
    }
}

impl From<&MockSettings> for MockConfig {
    fn from(settings: &MockSettings) -> Self {
        Self {
            name: settings.name.clone(),
            delay_ms: settings.delay_ms,
            value: settings.value.clone(),
            ..Self::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Executor
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of `Executor` for testing
pub struct MockExecutor {
    config: MockConfig,
    seen: RwLock<Vec<u64>>,
}

impl MockExecutor {
    /// Create a mock executor with default configuration
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a mock executor registered under `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(MockConfig {
            name: name.into(),
            ..MockConfig::default()
        })
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            seen: RwLock::new(Vec::new()),
        }
    }

    /// Number of items this executor was asked to run
    pub fn call_count(&self) -> usize {
        self.seen.read().len()
    }

    /// Ids of the items this executor was asked to run, in call order
    pub fn seen_items(&self) -> Vec<u64> {
        self.seen.read().clone()
    }

    async fn simulate_work(&self, ctx: &ExecutionContext, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return Ok(());
        }

        if !self.config.honor_cancel {
            tokio::time::sleep(delay).await;
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            reason = ctx.done() => Err(Error::Interrupted(reason)),
        }
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn execute(&self, ctx: &ExecutionContext, item: &TaskItem) -> Result<ExecutionResult> {
        self.seen.write().push(item.id);

        if item.param_bool("panic").unwrap_or(false) {
            panic!("mock executor asked to panic on item {}", item.id);
        }

        let delay = item.param_u64("delay_ms").unwrap_or(self.config.delay_ms);
        self.simulate_work(ctx, Duration::from_millis(delay)).await?;

        let fail = match item.params.get("fail") {
            Some(serde_json::Value::String(msg)) => Some(msg.clone()),
            Some(serde_json::Value::Bool(true)) => Some("mock failure".to_string()),
            _ => self.config.fail_with.clone(),
        };
        if let Some(message) = fail {
            return Err(Error::executor_failure(&self.config.name, message));
        }

        let status = match item.param_str("status") {
            Some(s) => ResultStatus::parse(s)
                .ok_or_else(|| Error::invalid_param("status", format!("unknown status '{}'", s)))?,
            None => self.config.status,
        };

        let value = match item.params.get("value") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.config.value.clone(),
        };

        Ok(ExecutionResult::normal(item.id)
            .with_status(status)
            .with_value(value)
            .with_message(format!("{} checked", item.name)))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
