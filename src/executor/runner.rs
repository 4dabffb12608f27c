//! Task orchestration
//!
//! Admits tasks through a fixed-size pool, runs their items against the
//! executor registry under a deadline-bound cancellable context, records
//! the outcome in the store and notifies completion callbacks.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::ExecutorRegistry;
use crate::config::TaskManagerSettings;
use crate::error::{Error, Result};
use crate::types::{ExecutionResult, Task, TaskCallback, TaskItem, TaskStatus};

use super::{CompletionCallback, DoneReason, ExecutionContext, TaskStore, MAX_TIMEOUT};

// ─────────────────────────────────────────────────────────────────
// Orchestrator Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the task orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Admission pool capacity
    pub max_concurrent_tasks: usize,

    /// Timeout applied when a task asks for none (seconds)
    pub default_timeout_secs: u64,

    /// How long finished tasks stay queryable
    pub retention: Duration,

    /// How often the evictor runs
    pub sweep_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            default_timeout_secs: 30,
            retention: super::DEFAULT_RETENTION,
            sweep_interval: super::DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl From<&TaskManagerSettings> for OrchestratorConfig {
    fn from(settings: &TaskManagerSettings) -> Self {
        Self {
            max_concurrent_tasks: settings.max_workers,
            default_timeout_secs: settings.default_timeout_secs,
            retention: Duration::from_secs(settings.task_retention_hours.saturating_mul(60 * 60)),
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs).min(MAX_TIMEOUT),
        }
    }
}

impl OrchestratorConfig {
    /// Requested timeout if positive, otherwise the default; never above `MAX_TIMEOUT`
    pub fn effective_timeout(&self, timeout_secs: i64) -> Duration {
        let timeout = if timeout_secs > 0 {
            Duration::from_secs(timeout_secs as u64)
        } else {
            Duration::from_secs(self.default_timeout_secs)
        };
        timeout.min(MAX_TIMEOUT)
    }
}

type Callbacks = Arc<RwLock<Vec<Arc<dyn CompletionCallback>>>>;

/// Outcome of a synchronous run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Completed, or Failed when the context finished before the last item did
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<DoneReason>,
    pub has_failures: bool,
    pub results: Vec<ExecutionResult>,
    /// Items never attempted, in submission order
    pub skipped: Vec<u64>,
}

impl RunReport {
    fn new(items: &[TaskItem], results: Vec<ExecutionResult>, interrupted: Option<DoneReason>) -> Self {
        let skipped = items.iter().skip(results.len()).map(|item| item.id).collect();
        Self {
            status: if interrupted.is_some() {
                TaskStatus::Failed
            } else {
                TaskStatus::Completed
            },
            error: interrupted.map(|reason| format!("Task interrupted: {}", reason)),
            interrupted,
            has_failures: results.iter().any(ExecutionResult::is_failed),
            results,
            skipped,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Orchestrator
// ─────────────────────────────────────────────────────────────────

/// Accepts tasks and drives them to a final state
pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<ExecutorRegistry>,
    store: Arc<TaskStore>,
    pool: Arc<Semaphore>,
    callbacks: Callbacks,
}

impl TaskOrchestrator {
    /// Create an orchestrator with its own store and admission pool
    pub fn new(config: OrchestratorConfig, registry: Arc<ExecutorRegistry>) -> Self {
        let store = Arc::new(TaskStore::new(config.retention));
        let pool = Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1)));

        Self {
            config,
            registry,
            store,
            pool,
            callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Builder-style callback registration
    pub fn with_callback(self, callback: Arc<dyn CompletionCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    pub fn add_callback(&self, callback: Arc<dyn CompletionCallback>) {
        info!(callback = %callback.name(), "Completion callback registered");
        self.callbacks.write().push(callback);
    }

    /// Store a new Pending task and start running it in the background
    pub fn submit(&self, task_id: impl Into<String>, items: Vec<TaskItem>, timeout_secs: i64) -> Result<Task> {
        let task_id = task_id.into();
        if task_id.trim().is_empty() {
            return Err(Error::InvalidTask("task id must not be empty".to_string()));
        }
        if items.is_empty() {
            return Err(Error::InvalidTask(format!("task {} has no items", task_id)));
        }

        let task = Task::new(task_id.clone(), items, timeout_secs);
        self.store.put(task.clone())?;

        info!(
            task_id = %task_id,
            items = task.items.len(),
            timeout_secs,
            "Task queued for execution"
        );

        let run = TaskRun {
            task_id,
            items: task.items.clone(),
            signal: task.cancel_signal().clone(),
            timeout: self.config.effective_timeout(timeout_secs),
            store: self.store.clone(),
            registry: self.registry.clone(),
            pool: self.pool.clone(),
            callbacks: self.callbacks.clone(),
        };
        tokio::spawn(run.execute());

        Ok(task)
    }

    /// Snapshot of a task
    pub fn get_status(&self, task_id: &str) -> Result<Task> {
        self.store.get(task_id).ok_or_else(|| Error::not_found(task_id))
    }

    /// Cancel a Running task; false for unknown, Pending or finished tasks
    pub fn cancel(&self, task_id: &str) -> bool {
        let canceled = self.store.cancel(task_id);
        if canceled {
            info!(task_id = %task_id, "Task canceled");
        }
        canceled
    }

    /// Like `cancel`, but says why a task could not be canceled
    pub fn try_cancel(&self, task_id: &str) -> Result<()> {
        if self.cancel(task_id) {
            return Ok(());
        }
        match self.store.get(task_id) {
            None => Err(Error::not_found(task_id)),
            Some(task) => Err(Error::NotCancelable {
                task_id: task_id.to_string(),
                status: task.status,
            }),
        }
    }

    /// Cancel every Running task, returning how many were canceled
    pub fn cancel_all(&self) -> usize {
        self.store
            .task_ids()
            .iter()
            .filter(|id| self.cancel(id))
            .count()
    }

    /// Run items directly, without a stored task, cancel handle or callback
    pub async fn run_synchronous(&self, items: Vec<TaskItem>, timeout_secs: i64) -> RunReport {
        let ctx = ExecutionContext::with_timeout(self.config.effective_timeout(timeout_secs));
        let results = run_items(&ctx, &items, &self.registry).await;

        let report = RunReport::new(&items, results, ctx.err());
        if let Some(reason) = report.interrupted {
            warn!(
                %reason,
                executed = report.results.len(),
                skipped = report.skipped.len(),
                "Synchronous run interrupted"
            );
        }
        report
    }

    /// Start the background evictor with the configured retention and interval
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        self.store.spawn_sweeper(self.config.sweep_interval, shutdown)
    }

    pub fn running_count(&self) -> usize {
        self.store.running_count()
    }

    pub fn pending_count(&self) -> usize {
        self.store.pending_count()
    }

    /// Free admission slots
    pub fn available_slots(&self) -> usize {
        self.pool.available_permits()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<ExecutorRegistry> {
        self.registry.clone()
    }

    pub fn store(&self) -> Arc<TaskStore> {
        self.store.clone()
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Execution
// ─────────────────────────────────────────────────────────────────

/// Everything a spawned run needs, detached from the orchestrator
struct TaskRun {
    task_id: String,
    items: Vec<TaskItem>,
    signal: CancellationToken,
    timeout: Duration,
    store: Arc<TaskStore>,
    registry: Arc<ExecutorRegistry>,
    pool: Arc<Semaphore>,
    callbacks: Callbacks,
}

impl TaskRun {
    async fn execute(self) {
        let task_id = self.task_id.as_str();

        let permit = match self.pool.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Admission pool closed");
                return;
            }
        };

        let ctx = ExecutionContext::linked(&self.signal, self.timeout);
        if !self.store.start(task_id, ctx.deadline()) {
            warn!(task_id = %task_id, "Task vanished before it could start");
            return;
        }
        info!(task_id = %task_id, timeout_secs = self.timeout.as_secs(), "Starting task execution");

        let started = Instant::now();
        let results = run_items(&ctx, &self.items, &self.registry).await;
        drop(permit);

        let executed = results.len();
        self.store.set_results(task_id, results);

        let (status, error) = match ctx.err() {
            Some(DoneReason::Canceled) => (
                TaskStatus::Canceled,
                Error::TaskCanceled { task_id: task_id.to_string() }.to_string(),
            ),
            Some(DoneReason::DeadlineExceeded) => (
                TaskStatus::Failed,
                Error::TaskTimeout {
                    task_id: task_id.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
                .to_string(),
            ),
            None => (TaskStatus::Completed, String::new()),
        };
        let error = Some(error).filter(|e| !e.is_empty());

        if !self.store.transition(task_id, status, error) {
            debug!(task_id = %task_id, status = %status, "Task already finalized");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let failed = self
            .store
            .get(task_id)
            .map(|task| task.failed_items())
            .unwrap_or_default();
        match status {
            TaskStatus::Completed => info!(
                task_id = %task_id,
                executed,
                failed = ?failed,
                elapsed_ms,
                "Task completed"
            ),
            _ => warn!(
                task_id = %task_id,
                status = %status,
                executed,
                total = self.items.len(),
                elapsed_ms,
                "Task ended early"
            ),
        }

        self.notify().await;
    }

    async fn notify(&self) {
        let Some(task) = self.store.get(&self.task_id) else {
            warn!(task_id = %self.task_id, "Task evicted before callbacks ran");
            return;
        };
        let payload = TaskCallback::from(&task);

        let callbacks: Vec<_> = self.callbacks.read().iter().cloned().collect();
        for callback in callbacks {
            if let Err(e) = callback.notify(&payload).await {
                warn!(
                    task_id = %self.task_id,
                    callback = %callback.name(),
                    error = %e.format_for_log(),
                    "Completion callback failed"
                );
            }
        }
    }
}

/// Run items in order until the context finishes
///
/// Item-level failures become Failed results; the loop only stops early
/// when the context is done.
pub async fn run_items(
    ctx: &ExecutionContext,
    items: &[TaskItem],
    registry: &ExecutorRegistry,
) -> Vec<ExecutionResult> {
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        if let Some(reason) = ctx.err() {
            debug!(item_id = item.id, %reason, "Context done; skipping remaining items");
            break;
        }
        results.push(execute_item(ctx, item, registry).await);
    }

    results
}

async fn execute_item(ctx: &ExecutionContext, item: &TaskItem, registry: &ExecutorRegistry) -> ExecutionResult {
    let started = Instant::now();

    let result = match registry.resolve(&item.kind) {
        Err(e) => {
            warn!(item_id = item.id, kind = %item.kind, "No executor for item type");
            ExecutionResult::failed(item.id, format!("Failed to resolve executor: {}", e), e.format_for_log())
        }
        Ok(executor) => match AssertUnwindSafe(executor.execute(ctx, item)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                if e.is_item_level() {
                    debug!(item_id = item.id, executor = %executor.name(), error = %e, "Item failed");
                } else {
                    warn!(
                        item_id = item.id,
                        executor = %executor.name(),
                        error = %e.format_for_log(),
                        "Executor returned a task-level error"
                    );
                }
                ExecutionResult::failed(item.id, format!("Execution failed: {}", e), e.format_for_log())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(item_id = item.id, executor = %executor.name(), panic = %message, "Executor panicked");
                ExecutionResult::failed(item.id, format!("Executor panicked: {}", message), "")
            }
        },
    };

    let mut result = result;
    result.item_id = item.id;
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
