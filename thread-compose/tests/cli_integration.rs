//! Integration tests for the thread-compose binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

struct TestEnv {
    _temp_dir: TempDir,
    config_path: String,
    db_path: String,
}

impl TestEnv {
    /// Environment with no config file; built-in defaults apply
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let db_path = temp_dir.path().join("data").join("posts.db");

        Self {
            config_path: config_path.to_string_lossy().to_string(),
            db_path: db_path.to_string_lossy().to_string(),
            _temp_dir: temp_dir,
        }
    }

    /// Environment whose config names a default account
    fn with_default_account(account: &str) -> Self {
        let env = Self::new();
        let config_content = format!(
            r#"
[database]
path = "{}"

[defaults]
account = "{}"
"#,
            escape_path_for_toml(&env.db_path),
            account
        );
        fs::write(&env.config_path, config_content).unwrap();
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("thread-compose").unwrap();
        cmd.env("THREADCAST_CONFIG", &self.config_path)
            .env("THREADCAST_DB_PATH", &self.db_path)
            .env_remove("THREADCAST_LOG_LEVEL")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run a compose command with JSON output and return the parsed report
    fn compose_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .args(args)
            .args(["--format", "json"])
            .output()
            .unwrap();
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("thread-compose")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("retry-schedule"))
        .stdout(predicate::str::contains("EXIT CODES"));
}

#[test]
fn test_draft_from_arguments() {
    let env = TestEnv::new();

    env.cmd()
        .args(["draft", "--account", "npub1alice", "first", "second"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Draft saved: "));
}

#[test]
fn test_schedule_from_stdin_json() {
    let env = TestEnv::new();

    let output = env
        .cmd()
        .args(["schedule", "--account", "npub1alice", "--format", "json"])
        .write_stdin("hello\n---\n   \n---\nworld\n")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "ok");
    assert_eq!(report["message"], "Thread scheduled");
    let post_id = report["post_id"].as_str().unwrap();

    let output = env
        .cmd()
        .args(["list", "--account", "npub1alice", "--format", "json"])
        .output()
        .unwrap();
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], post_id);
    assert_eq!(entries[0]["status"], "scheduled");
    assert_eq!(entries[0]["segments"], 2);
    assert_eq!(entries[0]["preview"], "hello");
}

#[test]
fn test_blank_thread_is_invalid_input() {
    let env = TestEnv::new();

    env.cmd()
        .args(["draft", "--account", "npub1alice", "  ", ""])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("empty thread"));
}

#[test]
fn test_missing_account_is_invalid_input() {
    let env = TestEnv::new();

    let report = env.compose_json(&["schedule", "hello"]);
    assert_eq!(report["status"], "error");
    assert_eq!(report["kind"], "validation");
    assert!(report.get("post_id").is_none());

    env.cmd()
        .args(["schedule", "hello"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no account"));
}

#[test]
fn test_default_account_from_config() {
    let env = TestEnv::with_default_account("npub1carol");

    let report = env.compose_json(&["draft", "from defaults"]);
    assert_eq!(report["status"], "ok");

    env.cmd()
        .args(["stats", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"drafts\": 1"));
}

#[test]
fn test_edit_draft_then_schedule() {
    let env = TestEnv::new();

    let report = env.compose_json(&["draft", "--account", "npub1alice", "rough"]);
    let post_id = report["post_id"].as_str().unwrap().to_string();

    let report = env.compose_json(&["schedule", "--edit", &post_id, "polished", "part two"]);
    assert_eq!(report["status"], "ok");
    assert_eq!(report["post_id"], post_id.as_str());

    env.cmd()
        .args(["show", &post_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status:   scheduled"))
        .stdout(predicate::str::contains("polished\n---\npart two"));

    env.cmd()
        .args(["stats", "--account", "npub1alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total:       1"))
        .stdout(predicate::str::contains("Scheduled:   1"));
}

#[test]
fn test_retry_schedule_of_draft_is_schedule_failure() {
    let env = TestEnv::new();

    let report = env.compose_json(&["draft", "--account", "npub1alice", "not yet"]);
    let post_id = report["post_id"].as_str().unwrap().to_string();

    env.cmd()
        .args(["retry-schedule", &post_id])
        .assert()
        .code(4)
        .stderr(predicate::str::contains(post_id.as_str()));
}

#[test]
fn test_retry_schedule_is_idempotent() {
    let env = TestEnv::new();

    let report = env.compose_json(&["schedule", "--account", "npub1alice", "hello"]);
    let post_id = report["post_id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        env.cmd()
            .args(["retry-schedule", &post_id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Thread scheduled"));
    }
}

#[test]
fn test_show_unknown_post() {
    let env = TestEnv::new();

    env.cmd()
        .args(["show", "no-such-post"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Post not found"));
}

#[test]
fn test_list_filters_by_status() {
    let env = TestEnv::new();

    env.compose_json(&["draft", "--account", "npub1alice", "draft one"]);
    env.compose_json(&["schedule", "--account", "npub1alice", "scheduled one"]);

    env.cmd()
        .args(["list", "--account", "npub1alice", "--status", "draft"])
        .assert()
        .success()
        .stdout(predicate::str::contains("draft one"))
        .stdout(predicate::str::contains("scheduled one").not());
}

#[test]
fn test_list_without_account_is_invalid_input() {
    let env = TestEnv::new();

    env.cmd()
        .arg("list")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--account"));
}

#[test]
fn test_invalid_status_is_rejected_by_parser() {
    let env = TestEnv::new();

    env.cmd()
        .args(["list", "--account", "npub1alice", "--status", "published"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid status"));
}

#[test]
fn test_blank_default_account_is_invalid_input() {
    let env = TestEnv::with_default_account("");

    env.cmd()
        .arg("list")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No account given"));
}

#[test]
fn test_queue_create_and_list() {
    let env = TestEnv::new();

    let output = env
        .cmd()
        .args(["queue", "create", "Weekly tips"])
        .args(["--account", "npub1alice", "--format", "json"])
        .args(["--description", "Tips every Monday"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let queue: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(queue["name"], "Weekly tips");
    assert_eq!(queue["description"], "Tips every Monday");

    env.cmd()
        .args(["queue", "create", "--account", "npub1alice", "Evergreen"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Queue created: "));

    let output = env
        .cmd()
        .args(["queue", "list", "--account", "npub1alice"])
        .args(["--format", "json"])
        .output()
        .unwrap();
    let queues: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = queues
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Weekly tips", "Evergreen"]);
}

#[test]
fn test_queue_with_blank_name_is_invalid_input() {
    let env = TestEnv::new();

    env.cmd()
        .args(["queue", "create", "--account", "npub1alice", "   "])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("blank queue name"));

    env.cmd()
        .args(["queue", "list", "--account", "npub1alice"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_queue_without_account_is_invalid_input() {
    let env = TestEnv::new();

    env.cmd()
        .args(["queue", "create", "Weekly"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--account"));
}

#[test]
fn test_duplicate_queue_name_fails() {
    let env = TestEnv::new();

    env.cmd()
        .args(["queue", "create", "--account", "npub1alice", "Weekly"])
        .assert()
        .success();
    env.cmd()
        .args(["queue", "create", "--account", "npub1alice", "Weekly"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}
