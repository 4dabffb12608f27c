//! Local shell command executor
//!
//! Runs `params.command` through a shell (`sh -c` by default) and turns the
//! outcome into an item result:
//! - non-zero exit: Failed, stderr as value
//! - stdout containing `params.threshold`: Warning
//! - otherwise Normal, trimmed stdout as value

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::ShellSettings;
use crate::error::{Error, Result};
use crate::executor::ExecutionContext;
use crate::types::{ExecutionResult, ResultStatus, TaskItem};

use super::Executor;

/// Configuration for the shell executor
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Registry key
    pub name: String,

    /// Shell program
    pub program: String,

    /// Arguments placed before the command string
    pub args: Vec<String>,

    /// Per-command limit, further bounded by the task deadline
    pub timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            name: "shell".to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ShellSettings> for ShellConfig {
    fn from(settings: &ShellSettings) -> Self {
        Self {
            name: settings.name.clone(),
            program: settings.shell.clone(),
            args: settings.args.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Executes items as local shell commands
pub struct ShellExecutor {
    config: ShellConfig,
}

impl ShellExecutor {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn execute(&self, ctx: &ExecutionContext, item: &TaskItem) -> Result<ExecutionResult> {
        let script = item.require_str("command")?;
        let threshold = item.param_str("threshold").filter(|t| !t.is_empty());

        trace!(item_id = item.id, %script, "spawn");
        let child = self
            .command(script)
            .spawn()
            .map_err(|e| Error::executor_failure(&self.config.name, format!("spawn: {}", e)))?;

        let scoped = ctx.child(self.config.timeout);

        // Dropping the child on the interrupted branch kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| Error::executor_failure(&self.config.name, format!("wait: {}", e)))?
            }
            _ = scoped.done() => {
                if let Some(reason) = ctx.err() {
                    debug!(item_id = item.id, %reason, "Command interrupted; killing child");
                    return Err(Error::Interrupted(reason));
                }
                debug!(item_id = item.id, timeout_secs = self.config.timeout.as_secs(), "Command timed out");
                return Err(Error::executor_failure(
                    &self.config.name,
                    format!("command timed out after {}s", self.config.timeout.as_secs()),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let details = format!("Command: {}\nStdout: {}\nStderr: {}", script, stdout, stderr);

        if !output.status.success() {
            let message = match output.status.code() {
                Some(code) => format!("Command exited with code {}", code),
                None => "Command terminated by signal".to_string(),
            };
            return Ok(ExecutionResult::failed(item.id, message, details).with_value(stderr));
        }

        let (status, message) = match threshold {
            Some(t) if stdout.contains(t) => {
                (ResultStatus::Warning, format!("Output contains threshold '{}'", t))
            }
            _ => (ResultStatus::Normal, "Command succeeded".to_string()),
        };

        Ok(ExecutionResult::normal(item.id)
            .with_status(status)
            .with_value(stdout)
            .with_message(message)
            .with_details(details))
    }
}
