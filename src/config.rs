//! Configuration system for the patrol agent
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PATROL_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent identity
    pub agent: AgentSettings,

    /// Orchestrator limits and retention
    pub task_manager: TaskManagerSettings,

    /// Completion callback target
    pub callback: CallbackSettings,

    /// Built-in executors
    pub executors: ExecutorSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Agent identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent identifier (host name if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Cluster this agent inspects
    pub cluster_name: String,
}

/// Task orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskManagerSettings {
    /// Admission pool capacity (tasks running at once)
    pub max_workers: usize,

    /// Timeout for tasks that request none (seconds)
    pub default_timeout_secs: u64,

    /// How long finished tasks stay queryable (hours)
    pub task_retention_hours: u64,

    /// How often finished tasks are swept (seconds)
    pub sweep_interval_secs: u64,
}

/// Completion callback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackSettings {
    /// Controller endpoint (empty = no HTTP callback)
    pub url: String,

    /// Sent as X-API-Key when not empty
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Built-in executor settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub mock: MockSettings,
    pub shell: ShellSettings,
}

/// Mock executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    pub enabled: bool,

    /// Item type served by this executor
    pub name: String,

    /// Simulated work per item in milliseconds
    pub delay_ms: u64,

    /// Value reported for every item
    pub value: String,
}

/// Shell executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub enabled: bool,

    /// Item type served by this executor
    pub name: String,

    /// Shell program
    pub shell: String,

    /// Arguments placed before the command string
    pub args: Vec<String>,

    /// Per-command timeout in seconds
    pub timeout_secs: u64,
}

/// Console log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Log file rotation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Output format
    pub format: LogFormat,

    /// File rotation period
    pub rotation: LogRotation,

    /// Number of rotated log files to keep
    pub max_files: usize,
}

// Default implementations

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            id: None,
            cluster_name: "default".to_string(),
        }
    }
}

impl Default for TaskManagerSettings {
    fn default() -> Self {
        Self {
            max_workers: 10,
            default_timeout_secs: 30,
            task_retention_hours: 24,
            sweep_interval_secs: 3600,
        }
    }
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "mock".to_string(),
            delay_ms: 0,
            value: "ok".to_string(),
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "shell".to_string(),
            shell: "sh".to_string(),
            args: vec!["-c".to_string()],
            timeout_secs: 30,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Pretty,
            rotation: LogRotation::Daily,
            max_files: 7,
        }
    }
}

impl AgentConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = Self::parse(&content)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse TOML content without env overrides or validation
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            source: Some(e),
        })
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            Some(PathBuf::from("patrol-agent.toml")),
            // User config directory
            dirs::config_dir().map(|p| p.join("patrol").join("agent.toml")),
            // Home directory
            dirs::home_dir().map(|p| p.join(".patrol").join("agent.toml")),
            // System config (Linux)
            Some(PathBuf::from("/etc/patrol/agent.toml")),
        ];

        for path in search_paths.iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Agent settings
        if let Ok(val) = std::env::var("PATROL_AGENT_ID") {
            self.agent.id = Some(val);
        }
        if let Ok(val) = std::env::var("PATROL_CLUSTER_NAME") {
            self.agent.cluster_name = val;
        }

        // Task manager settings
        if let Ok(val) = std::env::var("PATROL_MAX_WORKERS") {
            if let Ok(n) = val.parse() {
                self.task_manager.max_workers = n;
            }
        }
        if let Ok(val) = std::env::var("PATROL_DEFAULT_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.task_manager.default_timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("PATROL_TASK_RETENTION_HOURS") {
            if let Ok(n) = val.parse() {
                self.task_manager.task_retention_hours = n;
            }
        }

        // Callback settings
        if let Ok(val) = std::env::var("PATROL_CALLBACK_URL") {
            self.callback.url = val;
        }
        if let Ok(val) = std::env::var("PATROL_API_KEY") {
            self.callback.api_key = val;
        }

        // Executor settings
        if let Ok(val) = std::env::var("PATROL_MOCK_ENABLED") {
            self.executors.mock.enabled = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("PATROL_SHELL_ENABLED") {
            self.executors.shell.enabled = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("PATROL_SHELL") {
            self.executors.shell.shell = val;
        }

        // Logging settings
        if let Ok(val) = std::env::var("PATROL_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PATROL_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PATROL_LOG_FORMAT") {
            match val.to_lowercase().as_str() {
                "pretty" => self.logging.format = LogFormat::Pretty,
                "compact" => self.logging.format = LogFormat::Compact,
                "json" => self.logging.format = LogFormat::Json,
                _ => {}
            }
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate callback URL
        let url = &self.callback.url;
        if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::config_field_invalid(
                "callback.url",
                "Callback URL must start with http:// or https://",
            ));
        }

        let positive = [
            ("task_manager.max_workers", self.task_manager.max_workers as u64),
            ("task_manager.default_timeout_secs", self.task_manager.default_timeout_secs),
            ("task_manager.task_retention_hours", self.task_manager.task_retention_hours),
            ("task_manager.sweep_interval_secs", self.task_manager.sweep_interval_secs),
            ("callback.timeout_secs", self.callback.timeout_secs),
            ("executors.shell.timeout_secs", self.executors.shell.timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(Error::config_field_invalid(field, format!("{} must be greater than 0", field)));
            }
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Configured agent id, falling back to the host name
    pub fn agent_id(&self) -> String {
        if let Some(id) = self.agent.id.as_ref().filter(|id| !id.is_empty()) {
            return id.clone();
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "patrol-agent".to_string())
    }
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".patrol")
                .join("agent.toml")
        });

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# Patrol Agent Configuration

[agent]
# Agent identifier (defaults to the host name)
# id = "agent-01"

# Cluster this agent inspects
cluster_name = "default"

[task_manager]
# Tasks allowed to run at once; further submissions wait for a slot
max_workers = 10

# Timeout for tasks that do not request one (seconds)
default_timeout_secs = 30

# How long finished tasks stay queryable (hours)
task_retention_hours = 24

# How often finished tasks are swept (seconds)
sweep_interval_secs = 3600

[callback]
# Controller endpoint notified when a task finishes (empty = disabled)
url = ""

# Sent as the X-API-Key header
api_key = ""

# Request timeout in seconds
timeout_secs = 10

[executors.mock]
# Deterministic executor for dry runs
enabled = false
name = "mock"
delay_ms = 0
value = "ok"

[executors.shell]
# Runs params.command through a local shell
enabled = true
name = "shell"
shell = "sh"
args = ["-c"]
timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.patrol/logs/agent.log"

# Console format: pretty, compact, json
format = "pretty"

# File rotation: hourly, daily, never
rotation = "daily"

# Number of rotated log files to keep
max_files = 7
"#
    .to_string()
}
