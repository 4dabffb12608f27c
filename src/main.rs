//! Patrol Agent - inspection task runner
//!
//! This is the main entry point for the patrol-agent binary.
//! It loads configuration, builds the executor registry and orchestrator,
//! and drives them from task files.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use patrol_agent::backend::ExecutorRegistry;
use patrol_agent::cli::{self, Cli, Commands};
use patrol_agent::config::{self, AgentConfig};
use patrol_agent::error::{Error, Result};
use patrol_agent::executor::{
    ChannelCallback, HttpCallback, OrchestratorConfig, TaskOrchestrator,
};
use patrol_agent::logging::{self, LogGuards};
use patrol_agent::types::{TaskCallback, TaskRequest};
use patrol_agent::version;

fn main() {
    if let Err(e) = real_main() {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn real_main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    match cli.command {
        // For commands that don't need full logging, use simple setup
        Commands::Version { json } => {
            version::print_version(json);
            Ok(())
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Run { config, tasks } => {
            let (config, runtime, _log_guards) = start_agent(config.as_deref(), cli.verbose, cli.quiet)?;
            runtime.block_on(run_tasks(config, &tasks))
        }
        Commands::Exec { config, task, timeout } => {
            let (config, runtime, _log_guards) = start_agent(config.as_deref(), cli.verbose, cli.quiet)?;
            runtime.block_on(exec_task(config, &task, timeout))
        }
    }
}

/// Load configuration, start logging and build the async runtime
///
/// The returned guards must be kept alive for the lifetime of the program.
fn start_agent(
    config_path: Option<&str>,
    verbose: u8,
    quiet: bool,
) -> Result<(AgentConfig, tokio::runtime::Runtime, LogGuards)> {
    let config = AgentConfig::load(config_path)?;

    let log_guards = logging::init_logging(&config.logging, verbose, quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        agent_id = %config.agent_id(),
        cluster = %config.agent.cluster_name,
        "Starting patrol agent"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().clamp(1, 8))
        .thread_name("patrol-agent")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    Ok((config, runtime, log_guards))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn build_orchestrator(config: &AgentConfig) -> Result<TaskOrchestrator> {
    let registry = ExecutorRegistry::from_settings(&config.executors)?;
    if registry.is_empty() {
        warn!("No executors enabled; every item will fail to resolve");
    }
    info!(executors = ?registry.names(), "Executor registry ready");

    let orchestrator = TaskOrchestrator::new(
        OrchestratorConfig::from(&config.task_manager),
        Arc::new(registry),
    );

    if config.callback.url.is_empty() {
        warn!("Callback URL not configured; task results will not be reported to a controller");
    } else {
        orchestrator.add_callback(Arc::new(HttpCallback::new(&config.callback)?));
    }

    Ok(orchestrator)
}

/// Submit every task in the file and wait for each to finish
async fn run_tasks(config: AgentConfig, tasks_path: &Path) -> Result<()> {
    let requests: Vec<TaskRequest> = read_json(tasks_path)?;
    let orchestrator = build_orchestrator(&config)?;

    let (channel, mut completions) = ChannelCallback::channel(requests.len());
    orchestrator.add_callback(Arc::new(channel));

    let shutdown = CancellationToken::new();
    let sweeper = orchestrator.spawn_sweeper(shutdown.clone());

    let mut order = HashMap::new();
    let mut first_error = None;
    for request in requests {
        let task_id = request.resolve_id();
        match orchestrator.submit(task_id.clone(), request.items, request.timeout) {
            Ok(_) => {
                let position = order.len();
                order.insert(task_id, position);
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e.format_for_log(), "Task rejected");
                eprint!("{}", e.format_for_terminal());
                first_error.get_or_insert(e);
            }
        }
    }

    let mut finished: Vec<TaskCallback> = Vec::with_capacity(order.len());
    while finished.len() < order.len() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                let canceled = orchestrator.cancel_all();
                info!(canceled, "Interrupt received; canceling running tasks");
            }
            completion = completions.recv() => match completion {
                Some(payload) => finished.push(payload),
                None => break,
            },
        }
    }

    shutdown.cancel();
    let _ = sweeper.await;

    finished.sort_by_key(|p| order.get(&p.task_id).copied().unwrap_or(usize::MAX));
    println!("{}", serde_json::to_string_pretty(&finished)?);

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Run one task's items synchronously and print the report
///
/// An interrupted run still prints its report, then fails with the reason.
async fn exec_task(config: AgentConfig, task_path: &Path, timeout: Option<i64>) -> Result<()> {
    let request: TaskRequest = read_json(task_path)?;
    if request.items.is_empty() {
        return Err(Error::InvalidTask("task has no items".to_string()));
    }

    let registry = ExecutorRegistry::from_settings(&config.executors)?;
    let orchestrator = TaskOrchestrator::new(
        OrchestratorConfig::from(&config.task_manager),
        Arc::new(registry),
    );

    let report = orchestrator
        .run_synchronous(request.items, timeout.unwrap_or(request.timeout))
        .await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    match report.interrupted {
        Some(reason) => Err(Error::Interrupted(reason)),
        None => Ok(()),
    }
}

fn handle_config_command(subcommand: cli::ConfigSubcommand) -> Result<()> {
    use cli::ConfigSubcommand;

    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = AgentConfig::load(config.as_deref())?;
            println!("{}", cfg.to_toml()?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", path.display());
        }
        ConfigSubcommand::Validate { config } => {
            AgentConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
