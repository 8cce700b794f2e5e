//! Smoke tests for the `pi` CLI binary itself, as opposed to the library
//! API exercised in `swarm_integration.rs`.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn run_completes_with_a_one_agent_roster_and_a_noop_binary() {
    let dir = tempfile::tempdir().unwrap();
    let roster_path = dir.path().join("roster.json");
    std::fs::write(
        &roster_path,
        r#"[{"name":"a1","role":"agent","swarm":"s1","task":"say hi"}]"#,
    )
    .unwrap();

    Command::cargo_bin("pi")
        .unwrap()
        .arg("run")
        .arg(&roster_path)
        .arg("--base-dir")
        .arg(dir.path().join("channels"))
        .arg("--claude-cmd")
        .arg("true")
        .arg("--graceful-shutdown")
        .arg("false")
        .assert()
        .success();
}

#[test]
fn run_fails_on_an_empty_roster() {
    let dir = tempfile::tempdir().unwrap();
    let roster_path = dir.path().join("roster.json");
    std::fs::write(&roster_path, "[]").unwrap();

    Command::cargo_bin("pi")
        .unwrap()
        .arg("run")
        .arg(&roster_path)
        .arg("--base-dir")
        .arg(dir.path().join("channels"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("roster"));
}

#[test]
fn run_fails_on_a_missing_roster_file() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("pi")
        .unwrap()
        .arg("run")
        .arg(dir.path().join("missing.json"))
        .arg("--base-dir")
        .arg(dir.path().join("channels"))
        .assert()
        .failure();
}
