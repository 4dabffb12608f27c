//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// The agent binary, run from an empty directory with PATROL_* cleared
pub fn agent_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("patrol-agent").unwrap();
    cmd.current_dir(cwd);
    for (key, _) in std::env::vars() {
        if key.starts_with("PATROL_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

/// Scratch directory holding a config file and task files
pub struct TestEnv {
    pub root: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write `content` to `name` inside the environment
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// A config enabling the mock executor with quiet logging
    pub fn mock_config(&self) -> PathBuf {
        self.write(
            "agent.toml",
            r#"
[executors.mock]
enabled = true

[logging]
level = "error"
"#,
        )
    }

    pub fn cmd(&self) -> Command {
        agent_cmd(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_exist() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
        assert!(valid_config_fixture().exists());
        assert!(invalid_config_fixture().exists());
        assert!(fixture_path("tasks.json").exists());
        assert!(fixture_path("exec_task.json").exists());
    }
}
