//! Configuration system tests
//!
//! Tests configuration loading, validation, and environment overrides

mod common;

use std::fs;
use std::path::PathBuf;

use predicates::prelude::*;
use tempfile::TempDir;

use patrol_agent::config::{AgentConfig, LogFormat};
use patrol_agent::error::Error;
use patrol_agent::executor::OrchestratorConfig;

/// Test fixture for configuration testing
struct ConfigFixture {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("agent.toml");
        Self { temp_dir, config_path }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }

    fn validate(&self) -> assert_cmd::assert::Assert {
        common::agent_cmd(self.temp_dir.path())
            .args(["config", "validate", "--config", self.path()])
            .assert()
    }

    fn show(&self) -> assert_cmd::Command {
        let mut cmd = common::agent_cmd(self.temp_dir.path());
        cmd.args(["config", "show", "--config", self.path()]);
        cmd
    }
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_empty_config() {
    let fixture = ConfigFixture::new();
    fixture.write_config("");
    fixture.validate().success();
}

#[test]
fn test_full_config() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[agent]
id = "agent-007"
cluster_name = "prod-east"

[task_manager]
max_workers = 4
default_timeout_secs = 60
task_retention_hours = 48
sweep_interval_secs = 600

[callback]
url = "https://controller.example.com/api/tasks/callback"
api_key = "secret"
timeout_secs = 15

[executors.mock]
enabled = true
name = "metrics"
delay_ms = 5
value = "42"

[executors.shell]
enabled = true
name = "shell"
shell = "bash"
args = ["-lc"]
timeout_secs = 120

[logging]
level = "debug"
file = "/tmp/patrol/agent.log"
format = "json"
rotation = "hourly"
max_files = 3
"#,
    );

    fixture.validate().success();

    let config = AgentConfig::load(Some(fixture.path())).unwrap();
    assert_eq!(config.agent_id(), "agent-007");
    assert_eq!(config.executors.mock.name, "metrics");
    assert_eq!(config.executors.shell.args, vec!["-lc".to_string()]);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_fixture_config_drives_orchestrator() {
    let config = AgentConfig::load(common::valid_config_fixture().to_str()).unwrap();
    let orchestrator = OrchestratorConfig::from(&config.task_manager);

    assert_eq!(orchestrator.max_concurrent_tasks, 2);
    assert_eq!(orchestrator.default_timeout_secs, 10);
    assert_eq!(orchestrator.retention.as_secs(), 3600);
    assert_eq!(orchestrator.sweep_interval.as_secs(), 60);
}

#[test]
fn test_show_round_trips() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[agent]\ncluster_name = \"edge\"\n");

    let output = fixture.show().output().unwrap();
    assert!(output.status.success());

    let shown = AgentConfig::parse(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(shown.agent.cluster_name, "edge");
    assert_eq!(shown.task_manager.max_workers, 10);
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_callback_url() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[callback]\nurl = \"ftp://controller\"\n");

    fixture
        .validate()
        .code(10)
        .stderr(predicate::str::contains("http://"));
}

#[test]
fn test_invalid_log_level() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[logging]\nlevel = \"loud\"\n");

    fixture
        .validate()
        .code(10)
        .stderr(predicate::str::contains("loud"));
}

#[test]
fn test_zero_values_rejected() {
    for (section, key) in [
        ("task_manager", "max_workers"),
        ("task_manager", "default_timeout_secs"),
        ("task_manager", "task_retention_hours"),
        ("callback", "timeout_secs"),
    ] {
        let content = format!("[{}]\n{} = 0\n", section, key);
        let err = AgentConfig::parse(&content).unwrap().validate().unwrap_err();
        match err {
            Error::ConfigValidation { field, .. } => {
                assert_eq!(field, Some(format!("{}.{}", section, key)));
            }
            other => panic!("expected validation error for {}, got {}", key, other),
        }
    }
}

#[test]
fn test_wrong_type_rejected() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[task_manager]\nmax_workers = \"many\"\n");

    fixture
        .validate()
        .code(10)
        .stderr(predicate::str::contains("E101"));
}

#[test]
fn test_unknown_log_format_rejected() {
    let err = AgentConfig::parse("[logging]\nformat = \"xml\"\n").unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
}

// ─────────────────────────────────────────────────────────────────
// Environment Override Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file_values() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[agent]\ncluster_name = \"from-file\"\n\n[task_manager]\nmax_workers = 2\n");

    let output = fixture
        .show()
        .env("PATROL_CLUSTER_NAME", "from-env")
        .env("PATROL_MAX_WORKERS", "7")
        .env("PATROL_CALLBACK_URL", "http://controller:8080/callback")
        .env("PATROL_LOG_FORMAT", "json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let shown = AgentConfig::parse(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(shown.agent.cluster_name, "from-env");
    assert_eq!(shown.task_manager.max_workers, 7);
    assert_eq!(shown.callback.url, "http://controller:8080/callback");
    assert_eq!(shown.logging.format, LogFormat::Json);
}

#[test]
fn test_env_override_is_validated() {
    let fixture = ConfigFixture::new();
    fixture.write_config("");

    common::agent_cmd(fixture.temp_dir.path())
        .env("PATROL_CALLBACK_URL", "controller:8080")
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("E102"));
}

#[test]
fn test_unparseable_env_number_ignored() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[task_manager]\nmax_workers = 3\n");

    let output = fixture.show().env("PATROL_MAX_WORKERS", "lots").output().unwrap();
    assert!(output.status.success());

    let shown = AgentConfig::parse(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(shown.task_manager.max_workers, 3);
}

#[test]
fn test_local_config_file_discovered() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("patrol-agent.toml"), "[agent]\ncluster_name = \"local\"\n").unwrap();

    common::agent_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cluster_name = \"local\""));
}
