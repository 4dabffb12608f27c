//! Executor Registry
//!
//! Maps item types to executors and resolves them at dispatch time.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ExecutorSettings;
use crate::error::{Error, Result};

use super::{Executor, MockConfig, MockExecutor, ShellConfig, ShellExecutor};

// ─────────────────────────────────────────────────────────────────
// Executor Factory
// ─────────────────────────────────────────────────────────────────

/// Builds the built-in executors enabled in configuration
pub struct ExecutorFactory;

impl ExecutorFactory {
    /// Create every executor enabled in `settings`
    pub fn from_settings(settings: &ExecutorSettings) -> Result<Vec<Arc<dyn Executor>>> {
        let mut executors: Vec<Arc<dyn Executor>> = Vec::new();

        if settings.shell.enabled {
            if settings.shell.name.trim().is_empty() {
                return Err(Error::config_field_invalid("executors.shell.name", "must not be empty"));
            }
            executors.push(Arc::new(ShellExecutor::new(ShellConfig::from(&settings.shell))));
        }

        if settings.mock.enabled {
            if settings.mock.name.trim().is_empty() {
                return Err(Error::config_field_invalid("executors.mock.name", "must not be empty"));
            }
            executors.push(Arc::new(MockExecutor::with_config(MockConfig::from(&settings.mock))));
        }

        Ok(executors)
    }
}

// ─────────────────────────────────────────────────────────────────
// Executor Registry
// ─────────────────────────────────────────────────────────────────

/// Concurrency-safe map from item type to executor
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl ExecutorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the executors enabled in configuration
    pub fn from_settings(settings: &ExecutorSettings) -> Result<Self> {
        let registry = Self::new();
        for executor in ExecutorFactory::from_settings(settings)? {
            registry.register(executor);
        }
        Ok(registry)
    }

    /// Register an executor under its own name, replacing any previous one
    pub fn register(&self, executor: Arc<dyn Executor>) {
        let name = executor.name().to_string();
        let replaced = self.executors.write().insert(name.clone(), executor).is_some();

        tracing::info!(
            executor = %name,
            replaced,
            "Executor registered"
        );
    }

    /// Look up the executor for an item type
    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn Executor>> {
        self.executors
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::UnknownExecutor { kind: kind.to_string() })
    }

    /// Remove an executor, returning it if present
    pub fn unregister(&self, kind: &str) -> Option<Arc<dyn Executor>> {
        self.executors.write().remove(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.executors.read().contains_key(kind)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.executors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.read().is_empty()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
