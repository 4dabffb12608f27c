//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the patrol agent.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Patrol Agent - inspection task runner
///
/// Runs inspection tasks made of heterogeneous items against pluggable
/// executors and reports the results to a controller.
#[derive(Parser, Debug)]
#[command(name = "patrol-agent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the agent
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit tasks from a file and wait for all of them to finish
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "PATROL_CONFIG")]
        config: Option<String>,

        /// JSON file holding an array of tasks
        #[arg(short, long)]
        tasks: PathBuf,
    },

    /// Run one task's items directly and print the results
    Exec {
        /// Path to configuration file
        #[arg(short, long, env = "PATROL_CONFIG")]
        config: Option<String>,

        /// JSON file holding a single task
        #[arg(short, long)]
        task: PathBuf,

        /// Override the task timeout (seconds)
        #[arg(long)]
        timeout: Option<i64>,
    },

    /// Display version and build information
    Version {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from(["patrol-agent", "run", "--tasks", "tasks.json"]);
        match cli.command {
            Commands::Run { config, tasks } => {
                assert!(config.is_none());
                assert_eq!(tasks, PathBuf::from("tasks.json"));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_requires_tasks() {
        assert!(Cli::try_parse_from(["patrol-agent", "run"]).is_err());
    }

    #[test]
    fn test_exec_with_timeout() {
        let cli = Cli::parse_from([
            "patrol-agent", "exec", "--task", "t.json", "--timeout", "5", "--config", "/etc/a.toml",
        ]);
        match cli.command {
            Commands::Exec { config, task, timeout } => {
                assert_eq!(config, Some("/etc/a.toml".to_string()));
                assert_eq!(task, PathBuf::from("t.json"));
                assert_eq!(timeout, Some(5));
            }
            _ => panic!("Expected Exec command"),
        }
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["patrol-agent", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Version { json: false }));

        let cli = Cli::parse_from(["patrol-agent", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["patrol-agent", "config", "init", "--path", "/tmp/a.toml", "--force"]);
        match cli.command {
            Commands::Config { subcommand: ConfigSubcommand::Init { path, force } } => {
                assert_eq!(path, Some("/tmp/a.toml".to_string()));
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_config_validate() {
        let cli = Cli::parse_from(["patrol-agent", "config", "validate", "-c", "a.toml"]);
        match cli.command {
            Commands::Config { subcommand: ConfigSubcommand::Validate { config } } => {
                assert_eq!(config, Some("a.toml".to_string()));
            }
            _ => panic!("Expected Config Validate command"),
        }
    }
}
