//! Task type definitions
//!
//! Defines inspection tasks, their items and per-item results.
//! Field names match the JSON exchanged with the controller.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Task Items
// ─────────────────────────────────────────────────────────────────

/// One unit of inspection work, dispatched by `kind` to an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: u64,
    pub name: String,

    /// Executor registry key
    #[serde(rename = "type")]
    pub kind: String,

    /// Executor-specific parameters, decoded by the executor
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

impl TaskItem {
    pub fn new(id: u64, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: kind.into(),
            params: HashMap::new(),
        }
    }

    /// Builder-style parameter insertion
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| v.as_bool())
    }

    /// Required non-empty string parameter
    pub fn require_str(&self, key: &str) -> Result<&str> {
        match self.params.get(key) {
            None => Err(Error::invalid_param(key, "missing")),
            Some(v) => match v.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(s),
                Some(_) => Err(Error::invalid_param(key, "must not be empty")),
                None => Err(Error::invalid_param(key, "expected a string")),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Item Results
// ─────────────────────────────────────────────────────────────────

/// Health classification of a single item result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Normal,
    Warning,
    Critical,
    Failed,
}

impl ResultStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "warning" => Some(Self::Warning),
            "critical" => Some(Self::Critical),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Normal => write!(f, "normal"),
            ResultStatus::Warning => write!(f, "warning"),
            ResultStatus::Critical => write!(f, "critical"),
            ResultStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub item_id: u64,
    pub status: ResultStatus,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: String,
    /// Wall-clock time spent on the item
    #[serde(rename = "duration", default)]
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn normal(item_id: u64) -> Self {
        Self {
            item_id,
            status: ResultStatus::Normal,
            value: String::new(),
            message: String::new(),
            details: String::new(),
            duration_ms: 0,
        }
    }

    pub fn failed(item_id: u64, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            message: message.into(),
            details: details.into(),
            ..Self::normal(item_id)
        }
    }

    pub fn with_status(mut self, status: ResultStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == ResultStatus::Failed
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Lifecycle
// ─────────────────────────────────────────────────────────────────

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl TaskStatus {
    /// Completed, Failed and Canceled are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Canceled)
    }

    /// Pending → Running → {Completed, Failed, Canceled}
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, TaskStatus::Running) => true,
            (TaskStatus::Running, s) => s.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// A submitted task and its live state
///
/// Clones share the same cancel signal.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    #[serde(rename = "task_id")]
    pub id: String,
    pub status: TaskStatus,
    pub items: Vec<TaskItem>,
    pub results: Vec<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Requested timeout; zero or negative means the configured default
    #[serde(rename = "timeout")]
    pub timeout_secs: i64,
    /// Set once the task is admitted and running
    #[serde(skip)]
    pub deadline: Option<Instant>,
    #[serde(skip)]
    cancel: CancellationToken,
}

impl Task {
    /// Create a Pending task with a fresh cancel signal
    pub fn new(id: impl Into<String>, items: Vec<TaskItem>, timeout_secs: i64) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            items,
            results: Vec::new(),
            error: None,
            start_time: Utc::now(),
            end_time: None,
            timeout_secs,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_signal(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the run deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Whether any recorded item result is Failed
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(ExecutionResult::is_failed)
    }

    pub fn failed_items(&self) -> Vec<u64> {
        self.results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.item_id)
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────
// Wire Shapes
// ─────────────────────────────────────────────────────────────────

/// Completion notification sent once a task reaches a final state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCallback {
    pub task_id: String,
    pub status: TaskStatus,
    pub results: Vec<ExecutionResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub has_failures: bool,
}

impl From<&Task> for TaskCallback {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.status,
            results: task.results.clone(),
            start_time: task.start_time,
            end_time: task.end_time,
            error: task.error.clone(),
            has_failures: task.has_failures(),
        }
    }
}

/// Task submission as read from a file or request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub task_id: Option<String>,
    pub items: Vec<TaskItem>,
    #[serde(default)]
    pub timeout: i64,
}

impl TaskRequest {
    /// Use the given id or generate one
    pub fn resolve_id(&self) -> String {
        match &self.task_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
