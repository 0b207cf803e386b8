//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::PathBuf;

/// Build command for the sldgraph-cli binary (finds it in target/debug when run via cargo test).
fn sldgraph_cli() -> Command {
    cargo_bin_cmd!("sldgraph-cli")
}

/// Path to sldgraph library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("sldgraph")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = sldgraph_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("topology inference"));
}

#[test]
fn test_cli_version() {
    let mut cmd = sldgraph_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_analyze_human() {
    let mut cmd = sldgraph_cli();
    let path = fixtures_dir().join("scenario_a.json");

    cmd.arg("analyze").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Status: VALID"))
        .stdout(predicate::str::contains("母线_001 [B, S]"))
        .stdout(predicate::str::contains("c1: B - S on 母线_001 (0.841, 84.1%, medium, Engine)"));
}

#[test]
fn test_cli_analyze_json() {
    let mut cmd = sldgraph_cli();
    let path = fixtures_dir().join("substation.json");

    cmd.arg("analyze").arg(path).arg("--format").arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).expect("stdout should be JSON");
    assert_eq!(json["outcome"]["status"], "validated");
    assert_eq!(json["outcome"]["buses"].as_array().unwrap().len(), 1);
    assert_eq!(json["outcome"]["connections"].as_array().unwrap().len(), 4);
    assert_eq!(json["stats"]["candidate_edges"], 5);
}

#[test]
fn test_cli_analyze_nonexistent_file() {
    let mut cmd = sldgraph_cli();

    cmd.arg("analyze").arg("nonexistent_file.json");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_analyze_malformed_snapshot() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[{{\"id\": \"s1\"").unwrap();

    let mut cmd = sldgraph_cli();
    cmd.arg("analyze").arg(file.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to read snapshot"));
}

#[test]
fn test_cli_invalid_topology_reported() {
    let mut cmd = sldgraph_cli();
    let path = fixtures_dir().join("scenario_c.json");

    cmd.arg("analyze").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Status: INVALID"))
        .stdout(predicate::str::contains("isolated-component"));
}

#[test]
fn test_cli_fail_on_invalid() {
    let mut cmd = sldgraph_cli();
    let path = fixtures_dir().join("scenario_c.json");

    cmd.arg("analyze").arg(path).arg("--fail-on-invalid");

    cmd.assert().failure().code(1);
}

#[test]
fn test_cli_strict_fails_on_warnings() {
    let path = fixtures_dir().join("substation.json");

    sldgraph_cli()
        .arg("analyze")
        .arg(&path)
        .arg("--fail-on-invalid")
        .assert()
        .success();

    sldgraph_cli()
        .arg("analyze")
        .arg(&path)
        .arg("--strict")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_cli_analyze_with_config_and_overrides() {
    let dir = fixtures_dir();

    sldgraph_cli()
        .arg("analyze")
        .arg(dir.join("substation.json"))
        .arg("--config")
        .arg(dir.join("wide_threshold.json"))
        .arg("--strict")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connections: 5"));

    sldgraph_cli()
        .arg("analyze")
        .arg(dir.join("substation.json"))
        .arg("--overrides")
        .arg(dir.join("overrides.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Manual"));
}

#[test]
fn test_cli_invalid_config_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "k_neighbors": 0 }}"#).unwrap();

    let mut cmd = sldgraph_cli();
    cmd.arg("analyze")
        .arg(fixtures_dir().join("scenario_a.json"))
        .arg("--config")
        .arg(file.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("k_neighbors"));
}

#[test]
fn test_cli_filter_detections() {
    let mut cmd = sldgraph_cli();
    let path = fixtures_dir().join("detections.json");

    cmd.arg("filter").arg(path).arg("--threshold").arg("0.85");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Kept 4 of 6 detections"))
        .stdout(predicate::str::contains("circuit-breaker"))
        .stdout(predicate::str::contains("sw1").not());
}

#[test]
fn test_cli_filter_json() {
    let mut cmd = sldgraph_cli();
    let path = fixtures_dir().join("detections.json");

    cmd.arg("filter").arg(path).arg("-f").arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["total"], 6);
    assert_eq!(json["kept"].as_array().unwrap().len(), 6);
}

#[test]
fn test_cli_filter_rejects_bad_threshold() {
    let mut cmd = sldgraph_cli();
    let path = fixtures_dir().join("detections.json");

    cmd.arg("filter").arg(path).arg("--threshold").arg("1.5");

    cmd.assert().failure().code(1);
}

#[test]
fn test_cli_rules() {
    let mut cmd = sldgraph_cli();

    cmd.arg("rules");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("single-bus-membership"))
        .stdout(predicate::str::contains("isolated-source"));
}

#[test]
fn test_cli_templates() {
    let mut cmd = sldgraph_cli();

    cmd.arg("templates");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ampacity="));
}
