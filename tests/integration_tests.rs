//! Integration test harness
//!
//! End-to-end runs of the agent binary against a stub controller

mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use predicates::prelude::*;
use serde_json::Value;

use common::TestEnv;

// ─────────────────────────────────────────────────────────────────
// Stub Controller
// ─────────────────────────────────────────────────────────────────

/// A request as seen by the stub controller
struct Captured {
    head: String,
    body: Value,
}

impl Captured {
    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// Accepts `expected` requests, answering each with `status`
fn stub_controller(expected: usize, status: u16) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/api/tasks/callback", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming().take(expected) {
            let mut stream = stream.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let head_end = loop {
                let n = stream.read(&mut chunk).unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let length: usize = head
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse().ok())?
                })
                .unwrap_or(0);
            while buf.len() < head_end + length {
                let n = stream.read(&mut chunk).unwrap();
                buf.extend_from_slice(&chunk[..n]);
            }

            let body = serde_json::from_slice(&buf[head_end..head_end + length]).unwrap();
            let reply = format!("HTTP/1.1 {} Stub\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status);
            stream.write_all(reply.as_bytes()).unwrap();
            let _ = tx.send(Captured { head, body });
        }
    });

    (url, rx)
}

fn controller_config(env: &TestEnv, url: &str) -> std::path::PathBuf {
    env.write(
        "agent.toml",
        &format!(
            r#"
[callback]
url = "{}"
api_key = "k-123"
timeout_secs = 5

[executors.mock]
enabled = true

[logging]
level = "error"
"#,
            url
        ),
    )
}

// ─────────────────────────────────────────────────────────────────
// Callback Delivery
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_completion_posted_to_controller() {
    let (url, requests) = stub_controller(1, 200);
    let env = TestEnv::new();
    let config = controller_config(&env, &url);
    let tasks = env.write(
        "tasks.json",
        r#"[{"task_id": "remote-1", "items": [
            {"id": 1, "name": "cpu", "type": "mock"},
            {"id": 2, "name": "gone", "type": "ghost"}
        ]}]"#,
    );

    env.cmd()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--tasks")
        .arg(&tasks)
        .assert()
        .success();

    let captured = requests.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(captured.head.starts_with("POST /api/tasks/callback"));
    assert_eq!(captured.header("x-api-key").as_deref(), Some("k-123"));
    assert!(captured.header("content-type").unwrap().contains("application/json"));

    assert_eq!(captured.body["task_id"], "remote-1");
    assert_eq!(captured.body["status"], "completed");
    assert_eq!(captured.body["has_failures"], true);
    assert_eq!(captured.body["results"].as_array().unwrap().len(), 2);
    assert!(captured.body["end_time"].is_string());
}

#[test]
fn test_controller_rejection_does_not_fail_run() {
    let (url, requests) = stub_controller(1, 500);
    let env = TestEnv::new();
    let config = controller_config(&env, &url);
    let tasks = env.write(
        "tasks.json",
        r#"[{"task_id": "remote-2", "items": [{"id": 1, "name": "cpu", "type": "mock"}]}]"#,
    );

    env.cmd()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--tasks")
        .arg(&tasks)
        .assert()
        .success()
        .stdout(predicate::str::contains("remote-2"));

    assert!(requests.recv_timeout(Duration::from_secs(10)).is_ok());
}

#[test]
fn test_unreachable_controller_does_not_fail_run() {
    // Bind then drop to get a port nobody listens on
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let env = TestEnv::new();
    let config = controller_config(&env, &format!("http://127.0.0.1:{}/callback", port));
    let tasks = env.write(
        "tasks.json",
        r#"[{"task_id": "remote-3", "items": [{"id": 1, "name": "cpu", "type": "mock"}]}]"#,
    );

    env.cmd()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--tasks")
        .arg(&tasks)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"completed\""));
}

// ─────────────────────────────────────────────────────────────────
// Logging and Timing
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_log_file_creation() {
    let env = TestEnv::new();
    let log_path = env.path().join("logs").join("agent.log");
    let config = env.write(
        "agent.toml",
        &format!(
            "[executors.mock]\nenabled = true\n\n[logging]\nlevel = \"info\"\nfile = \"{}\"\nrotation = \"never\"\n",
            log_path.display()
        ),
    );
    let task = env.write("task.json", r#"{"items": [{"id": 1, "name": "cpu", "type": "mock"}]}"#);

    env.cmd()
        .arg("exec")
        .arg("--config")
        .arg(&config)
        .arg("--task")
        .arg(&task)
        .assert()
        .success();

    let entries: Vec<_> = std::fs::read_dir(env.path().join("logs"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert!(entries.iter().any(|name| name.starts_with("agent")), "log files: {:?}", entries);
}

#[test]
fn test_stdout_is_pure_json_with_verbose_logging() {
    let env = TestEnv::new();
    let config = env.mock_config();
    let task = env.write("task.json", r#"{"items": [{"id": 1, "name": "cpu", "type": "mock"}]}"#);

    let output = env
        .cmd()
        .arg("-vv")
        .arg("exec")
        .arg("--config")
        .arg(&config)
        .arg("--task")
        .arg(&task)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(serde_json::from_slice::<Value>(&output.stdout).is_ok());
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_task_timeout_end_to_end() {
    let env = TestEnv::new();
    let config = env.mock_config();
    let tasks = env.write(
        "tasks.json",
        r#"[{"task_id": "slow", "timeout": 1, "items": [
            {"id": 1, "name": "fast", "type": "mock"},
            {"id": 2, "name": "slow", "type": "mock", "params": {"delay_ms": 60000}},
            {"id": 3, "name": "never", "type": "mock"}
        ]}]"#,
    );

    let start = Instant::now();
    let output = env
        .cmd()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--tasks")
        .arg(&tasks)
        .output()
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(30));
    assert!(output.status.success());

    let finished: Value = serde_json::from_slice(&output.stdout).unwrap();
    let task = &finished[0];
    assert_eq!(task["status"], "failed");
    assert!(task["error"].as_str().unwrap().contains("timed out"));

    let results = task["results"].as_array().unwrap();
    assert_eq!(results[0]["item_id"], 1);
    assert!(results.iter().all(|r| r["item_id"] != 3));
}
