//! Task state store
//!
//! Holds every live task by id and evicts finished tasks once they are
//! older than the retention window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{ExecutionResult, Task, TaskStatus};

/// Default time a finished task stays queryable
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Default sweep period
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

// ─────────────────────────────────────────────────────────────────
// Task Store
// ─────────────────────────────────────────────────────────────────

/// Concurrency-safe map of task id to task state
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Task>>,
    retention: chrono::Duration,
}

impl TaskStore {
    /// Create a store that keeps finished tasks for `retention`
    pub fn new(retention: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            retention: chrono::Duration::from_std(retention)
                .unwrap_or_else(|_| chrono::Duration::days(365 * 100)),
        }
    }

    /// Insert a new task; an id already present is rejected
    pub fn put(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.write();
        if let Some(existing) = tasks.get(&task.id) {
            return Err(Error::AlreadyExists {
                task_id: task.id.clone(),
                status: existing.status,
            });
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Snapshot of a task
    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().get(task_id).cloned()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.read().contains_key(task_id)
    }

    /// Move a task to `status`; false when absent or the move is illegal
    pub fn set_status(&self, task_id: &str, status: TaskStatus) -> bool {
        self.transition(task_id, status, None)
    }

    /// Move a task to `status` and record `error` under one lock
    ///
    /// Terminal statuses stamp `end_time`.
    pub fn transition(&self, task_id: &str, status: TaskStatus, error: Option<String>) -> bool {
        let mut tasks = self.tasks.write();
        let Some(task) = tasks.get_mut(task_id) else {
            return false;
        };

        if !task.status.can_transition_to(status) {
            debug!(
                task_id = %task_id,
                from = %task.status,
                to = %status,
                "Rejected task status transition"
            );
            return false;
        }

        task.status = status;
        if status.is_terminal() {
            task.end_time = Some(Utc::now());
        }
        if error.is_some() {
            task.error = error;
        }
        true
    }

    /// Move a Pending task to Running and record its run deadline
    pub fn start(&self, task_id: &str, deadline: Instant) -> bool {
        let mut tasks = self.tasks.write();
        match tasks.get_mut(task_id) {
            Some(task) if task.status.can_transition_to(TaskStatus::Running) => {
                task.status = TaskStatus::Running;
                task.deadline = Some(deadline);
                true
            }
            _ => false,
        }
    }

    /// Replace a task's results
    pub fn set_results(&self, task_id: &str, results: Vec<ExecutionResult>) -> bool {
        let mut tasks = self.tasks.write();
        match tasks.get_mut(task_id) {
            Some(task) => {
                task.results = results;
                true
            }
            None => false,
        }
    }

    /// Cancel a Running task: fire its signal and mark it Canceled
    ///
    /// A task past its deadline has already timed out and is left for its
    /// run to finalize as Failed.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut tasks = self.tasks.write();
        let Some(task) = tasks.get_mut(task_id) else {
            return false;
        };

        if task.status != TaskStatus::Running {
            return false;
        }
        if task.is_expired() {
            debug!(task_id = %task_id, "Cancel refused; deadline already passed");
            return false;
        }

        task.cancel_signal().cancel();
        task.status = TaskStatus::Canceled;
        task.end_time = Some(Utc::now());
        task.error = Some(
            Error::TaskCanceled {
                task_id: task_id.to_string(),
            }
            .to_string(),
        );
        true
    }

    /// Remove finished tasks whose end time is older than the retention window
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let retention = self.retention;
        let mut tasks = self.tasks.write();
        let before = tasks.len();

        tasks.retain(|_, task| match task.end_time {
            Some(end) if task.is_terminal() => {
                end.checked_add_signed(retention).map_or(true, |expiry| expiry > now)
            }
            _ => true,
        });

        before - tasks.len()
    }

    /// Run `sweep` every `interval` until `shutdown` fires
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Task sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.sweep(Utc::now());
                        if removed > 0 {
                            info!(removed, remaining = store.len(), "Evicted expired tasks");
                        }
                    }
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.count_with(TaskStatus::Running)
    }

    pub fn pending_count(&self) -> usize {
        self.count_with(TaskStatus::Pending)
    }

    /// Ids of all stored tasks
    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.read().keys().cloned().collect()
    }

    fn count_with(&self, status: TaskStatus) -> usize {
        self.tasks.read().values().filter(|t| t.status == status).count()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
