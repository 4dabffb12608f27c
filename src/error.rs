//! Error types for the patrol agent
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::TaskStatus;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,
    Serialization = 204,

    // Task errors (3xx)
    TaskAlreadyExists = 300,
    TaskNotFound = 301,
    TaskInvalid = 302,
    TaskNotCancelable = 303,

    // Execution errors (5xx)
    ExecutionFailed = 500,
    ExecutionTimeout = 501,
    ExecutionCancelled = 502,
    ExecutionInterrupted = 503,
    UnknownExecutor = 504,
    InvalidParam = 505,

    // Callback errors (6xx)
    CallbackDelivery = 600,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Task errors
            500..=599 => 50, // Execution errors
            600..=699 => 60, // Callback errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Task Errors
    // ─────────────────────────────────────────────────────────────

    /// A live task already uses this id
    #[error("Task already exists: {task_id} (status: {status})")]
    AlreadyExists { task_id: String, status: TaskStatus },

    /// Unknown or evicted task id
    #[error("Task not found: {task_id}")]
    NotFound { task_id: String },

    /// Malformed task submission
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Task is not in a state that can be canceled
    #[error("Task {task_id} cannot be canceled while {status}")]
    NotCancelable { task_id: String, status: TaskStatus },

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// No executor registered for an item type
    #[error("Unknown executor type '{kind}'")]
    UnknownExecutor { kind: String },

    /// The resolved executor reported a failure
    #[error("Executor '{executor}' failed: {message}")]
    ExecutorFailure { executor: String, message: String },

    /// Item parameter missing or malformed
    #[error("Invalid parameter '{key}': {message}")]
    InvalidParam { key: String, message: String },

    /// In-flight work stopped because the execution context finished
    #[error("Execution interrupted: {0}")]
    Interrupted(crate::executor::DoneReason),

    /// Task deadline expired
    #[error("Task {task_id} timed out after {timeout_secs}s")]
    TaskTimeout { task_id: String, timeout_secs: u64 },

    /// Task cancel signal fired
    #[error("Task {task_id} was canceled")]
    TaskCanceled { task_id: String },

    // ─────────────────────────────────────────────────────────────
    // Callback Errors
    // ─────────────────────────────────────────────────────────────

    /// Completion callback could not be delivered
    #[error("Failed to deliver callback for task {task_id}: {message}")]
    CallbackDelivery { task_id: String, message: String },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::Serialization,

            Error::AlreadyExists { .. } => ErrorCode::TaskAlreadyExists,
            Error::NotFound { .. } => ErrorCode::TaskNotFound,
            Error::InvalidTask(_) => ErrorCode::TaskInvalid,
            Error::NotCancelable { .. } => ErrorCode::TaskNotCancelable,

            Error::UnknownExecutor { .. } => ErrorCode::UnknownExecutor,
            Error::ExecutorFailure { .. } => ErrorCode::ExecutionFailed,
            Error::InvalidParam { .. } => ErrorCode::InvalidParam,
            Error::Interrupted(_) => ErrorCode::ExecutionInterrupted,
            Error::TaskTimeout { .. } => ErrorCode::ExecutionTimeout,
            Error::TaskCanceled { .. } => ErrorCode::ExecutionCancelled,

            Error::CallbackDelivery { .. } => ErrorCode::CallbackDelivery,
            Error::Http(_) => ErrorCode::CallbackDelivery,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the error belongs to a single item and is absorbed into its result
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Error::UnknownExecutor { .. }
                | Error::ExecutorFailure { .. }
                | Error::InvalidParam { .. }
                | Error::Interrupted(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'patrol-agent config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'patrol-agent config validate' to see details."
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::AlreadyExists { .. } => Some(
                "Use a different task id, or wait until the existing task is evicted."
            ),
            Error::NotFound { .. } => Some(
                "The task may never have been submitted, or it finished long enough ago to be evicted."
            ),
            Error::UnknownExecutor { .. } => Some(
                "Enable the executor in the [executors] section of the configuration."
            ),
            Error::CallbackDelivery { .. } => Some(
                "Check [callback] url and api_key, and that the controller is reachable."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an executor failure
    pub fn executor_failure(executor: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ExecutorFailure {
            executor: executor.into(),
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_param(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidParam {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a task not found error
    pub fn not_found(task_id: impl Into<String>) -> Self {
        Error::NotFound {
            task_id: task_id.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
