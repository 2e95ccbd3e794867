//! End-to-end tests of the stdio server binary.

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const REQUESTS: &str = concat!(
    r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"cli-test","version":"0"}}}"#,
    "\n",
    r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
    "\n",
    r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
    "\n",
    r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_current_database","arguments":{}}}"#,
    "\n",
    r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"read_table","arguments":{"table_name":"orders"}}}"#,
    "\n",
);

fn write_config(dir: &TempDir, extra: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    let log = dir.path().join("logs").join("server.log");
    let content = format!(
        "[server]\nname = \"CLI Test Server\"\n\n[logging]\nlevel = \"debug\"\nfile = \"{}\"\n{}",
        log.display(),
        extra
    );
    fs::write(&path, content).unwrap();
    path
}

fn command() -> Command {
    let mut cmd = Command::cargo_bin("mysqladm").unwrap();
    for key in ["MYSQL_HOST", "MYSQL_PORT", "MYSQL_USER", "MYSQL_PASSWORD", "LOG_LEVEL", "LOG_FILE", "RUST_LOG"] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_stdio_session() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    let output = command()
        .arg(&config)
        .write_stdin(REQUESTS)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout carries only protocol messages"))
        .collect();
    assert_eq!(responses.len(), 4);

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "CLI Test Server");

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "switch_database"));
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));

    let current: Value =
        serde_json::from_str(responses[2]["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(current["status"], "success");
    assert_eq!(current["data"]["current_database"], Value::Null);

    assert_eq!(responses[3]["result"]["isError"], true);
    let read: Value =
        serde_json::from_str(responses[3]["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(read["message"], "Please use switch_database() to select a database first");

    let log = fs::read_to_string(dir.path().join("logs").join("server.log")).unwrap();
    assert!(log.contains("[CLIENT CALL] read_table"));
}

#[test]
fn test_invalid_config_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "\n[security]\nmax_results = 0\n");

    let assert = command().arg(&config).write_stdin("").assert().failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("max_results"));
    assert!(assert.get_output().stdout.is_empty());
}
