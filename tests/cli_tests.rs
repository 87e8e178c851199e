//! # CLI Tests
//!
//! Smoke tests over the `veriflow` binary: validate / project / simulate /
//! run against temp-file documents, exit codes and output shape.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn happy_net_json() -> &'static str {
    r#"{
  "schemaVersion": "1.0",
  "netId": "net_cli",
  "places": [
    { "id": "p_start", "capacity": 1 },
    { "id": "p_mid" },
    { "id": "p_done" }
  ],
  "transitions": [
    { "id": "t_first", "action": "fetch" },
    { "id": "t_second", "action": "build" }
  ],
  "arcs": [
    { "fromId": "p_start", "toId": "t_first" },
    { "fromId": "t_first", "toId": "p_mid" },
    { "fromId": "p_mid", "toId": "t_second" },
    { "fromId": "t_second", "toId": "p_done" }
  ],
  "initialMarking": { "p_start": 1 }
}"#
}

fn deadlocked_net_json() -> &'static str {
    r#"{
  "schemaVersion": "1.0",
  "netId": "net_cli_stuck",
  "places": [
    { "id": "p_start", "capacity": 1 },
    { "id": "p_mid" },
    { "id": "p_never" },
    { "id": "p_done" }
  ],
  "transitions": [
    { "id": "t_first" },
    { "id": "t_blocked" }
  ],
  "arcs": [
    { "fromId": "p_start", "toId": "t_first" },
    { "fromId": "t_first", "toId": "p_mid" },
    { "fromId": "p_mid", "toId": "t_blocked" },
    { "fromId": "p_never", "toId": "t_blocked" },
    { "fromId": "t_blocked", "toId": "p_done" }
  ],
  "initialMarking": { "p_start": 1 }
}"#
}

#[test]
fn validate_passes_a_sound_net() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flow.net.json");
    std::fs::write(&path, happy_net_json()).unwrap();

    Command::cargo_bin("veriflow")
        .unwrap()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pass"));
}

#[test]
fn validate_fails_a_deadlocked_net_with_exit_code() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stuck.net.json");
    std::fs::write(&path, deadlocked_net_json()).unwrap();

    Command::cargo_bin("veriflow")
        .unwrap()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("counterexample"));
}

#[test]
fn validate_writes_a_json_report() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flow.net.json");
    let report = dir.path().join("report.json");
    std::fs::write(&path, happy_net_json()).unwrap();

    Command::cargo_bin("veriflow")
        .unwrap()
        .args([
            "validate",
            path.to_str().unwrap(),
            "--output",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();

    let raw = std::fs::read_to_string(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["status"], "PASS");
    assert_eq!(value["petriNetId"], "net_cli");
}

#[test]
fn project_emits_the_dag() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flow.net.json");
    let out = dir.path().join("flow.dag.json");
    std::fs::write(&path, happy_net_json()).unwrap();

    Command::cargo_bin("veriflow")
        .unwrap()
        .args([
            "project",
            path.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("t_first"));

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["rootNode"], "t_first");
    assert_eq!(value["derivedFromPetriNetId"], "net_cli");
}

#[test]
fn simulate_writes_an_ndjson_trace() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flow.net.json");
    let trace = dir.path().join("trace.ndjson");
    std::fs::write(&path, happy_net_json()).unwrap();

    Command::cargo_bin("veriflow")
        .unwrap()
        .args([
            "simulate",
            path.to_str().unwrap(),
            "--trace",
            trace.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("terminal"));

    let raw = std::fs::read_to_string(&trace).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["transition"], "t_first");
    assert_eq!(first["sequenceNumber"], 0);
}

#[test]
fn run_executes_a_verified_net_end_to_end() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flow.net.json");
    std::fs::write(&path, happy_net_json()).unwrap();

    Command::cargo_bin("veriflow")
        .unwrap()
        .args(["run", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded"));
}

#[test]
fn run_accepts_an_intent_yaml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("intent.yaml");
    std::fs::write(
        &path,
        r#"
schemaVersion: "1.0"
name: cli smoke
steps:
  - id: fetch
  - id: build
    dependencies: [fetch]
"#,
    )
    .unwrap();

    Command::cargo_bin("veriflow")
        .unwrap()
        .args(["run", path.to_str().unwrap(), "--metrics"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nodesSucceeded"));
}

#[test]
fn missing_file_reports_a_fix_suggestion() {
    Command::cargo_bin("veriflow")
        .unwrap()
        .args(["validate", "/no/such/file.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Fix:"));
}
