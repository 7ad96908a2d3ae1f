//! Integration tests driving the `nixtest` binary.
//!
//! Documents only use literal values and local snapshots, so no Nix
//! installation is needed.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn nixtest_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nixtest"))
}

fn describe(output: &Output) -> String {
    format!(
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

const PASSING: &str = r#"[
  {
    "name": "math",
    "tests": [
      { "type": "unit", "name": "adds", "expected": 2, "actual": 2.0, "pos": "math.nix:3" },
      { "type": "unit", "name": "objects", "expected": {"a": 1, "b": 2}, "actual": {"b": 2, "a": 1} }
    ]
  },
  { "name": "empty", "tests": [] }
]"#;

const FAILING: &str = r#"[
  {
    "name": "strings",
    "tests": [
      { "type": "unit", "name": "greeting", "expected": "hello\nworld", "actual": "hello\nuniverse" },
      { "type": "unit", "name": "same", "expected": "x", "actual": "x" }
    ]
  }
]"#;

const SNAPSHOT: &str = r#"[
  {
    "name": "snaps",
    "tests": [
      { "type": "snapshot", "name": "Page Title", "actual": {"x": 1} }
    ]
  }
]"#;

fn write_doc(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn passing_run_exits_zero() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", PASSING);

    let output = nixtest_cmd().arg("run").arg(&doc).output().unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PASS   adds"));
    assert!(stdout.contains("TOTAL  2/2"));
    assert!(!stdout.contains("failed:"));
}

#[test]
fn failing_run_exits_two_with_diff() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", FAILING);

    let output = nixtest_cmd().arg("run").arg(&doc).output().unwrap();

    assert_eq!(output.status.code(), Some(2), "{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("⚠ Test \"strings/greeting\" failed:"));
    assert!(stdout.contains("| -world"));
    assert!(stdout.contains("| +universe"));
    assert!(stdout.contains("TOTAL  1/2"));
}

#[test]
fn json_output() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", FAILING);

    let output = nixtest_cmd()
        .args(["run", "--output", "json"])
        .arg(&doc)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2), "{}", describe(&output));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["total"], 2);
    assert_eq!(report["results"]["strings"][0]["name"], "greeting");
    assert_eq!(report["results"]["strings"][0]["status"], "failure");
}

#[test]
fn skip_pattern_skips_by_name() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", FAILING);

    let output = nixtest_cmd()
        .args(["run", "--skip", "^greet", "-o", "json"])
        .arg(&doc)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", describe(&output));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["results"]["strings"][0]["status"], "skipped");
}

#[test]
fn invalid_skip_pattern_exits_one() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", PASSING);

    let output = nixtest_cmd()
        .args(["run", "--skip", "[invalid"])
        .arg(&doc)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid skip pattern"));
}

#[test]
fn zero_workers_exits_one() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", PASSING);

    let output = nixtest_cmd()
        .args(["run", "--workers", "0"])
        .arg(&doc)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
}

#[test]
fn zero_timeout_exits_one() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", PASSING);

    let output = nixtest_cmd()
        .args(["run", "--timeout", "0"])
        .arg(&doc)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("timeout must be greater than zero"));
}

#[test]
fn no_color_output_is_plain() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", FAILING);

    let output = nixtest_cmd()
        .args(["run", "--no-color"])
        .arg(&doc)
        .env("CLICOLOR_FORCE", "1")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2), "{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains('\x1b'));
    assert!(stdout.contains("FAIL   greeting"));
}

#[test]
fn missing_document_exits_one() {
    let temp_dir = TempDir::new().unwrap();
    let output = nixtest_cmd()
        .arg("run")
        .arg(temp_dir.path().join("absent.json"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
}

#[test]
fn snapshot_missing_then_updated() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", SNAPSHOT);
    let snapshots = temp_dir.path().join("snaps");

    let output = nixtest_cmd()
        .arg("run")
        .arg(&doc)
        .arg("--snapshot-dir")
        .arg(&snapshots)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("| No Snapshot exists yet"));

    let output = nixtest_cmd()
        .arg("run")
        .arg(&doc)
        .arg("--snapshot-dir")
        .arg(&snapshots)
        .arg("--update-snapshots")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", describe(&output));

    let written = fs::read_to_string(snapshots.join("page_title.snap.json")).unwrap();
    let value: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value, serde_json::json!({"x": 1}));

    // The stored snapshot now satisfies a plain run
    let output = nixtest_cmd()
        .arg("run")
        .arg(&doc)
        .arg("--snapshot-dir")
        .arg(&snapshots)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", describe(&output));
}

#[test]
fn config_file_sets_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", SNAPSHOT);
    fs::write(
        temp_dir.path().join("nixtest.yaml"),
        "snapshot_dir: stored\njunit: report.xml\n",
    )
    .unwrap();

    let output = nixtest_cmd()
        .args(["run", "-u"])
        .arg(&doc)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", describe(&output));
    assert!(temp_dir.path().join("stored/page_title.snap.json").exists());
    let report = fs::read_to_string(temp_dir.path().join("report.xml")).unwrap();
    assert!(report.contains("<testcase name=\"Page Title\" classname=\"snaps\""));
}

#[test]
fn junit_file_output() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(temp_dir.path(), "tests.json", FAILING);
    let report = temp_dir.path().join("junit.xml");

    let output = nixtest_cmd()
        .arg("run")
        .arg(&doc)
        .arg("--junit")
        .arg(&report)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2), "{}", describe(&output));
    let xml = fs::read_to_string(&report).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("tests=\"2\" failures=\"1\" errors=\"0\" skipped=\"0\""));
    assert!(xml.contains("<failure message=\"Test failed\">"));
}

#[test]
fn yaml_document() {
    let temp_dir = TempDir::new().unwrap();
    let doc = write_doc(
        temp_dir.path(),
        "tests.yaml",
        r#"
- name: yaml
  tests:
    - type: unit
      name: list
      expected: [1, 2]
      actual: [1, 2]
"#,
    );

    let output = nixtest_cmd().arg("run").arg(&doc).output().unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", describe(&output));
}

#[test]
fn validate_reports_problems() {
    let temp_dir = TempDir::new().unwrap();
    let good = write_doc(temp_dir.path(), "good.json", PASSING);
    let bad = write_doc(
        temp_dir.path(),
        "bad.json",
        r#"[{"name": "s", "tests": [
            {"type": "fuzz", "name": "weird"},
            {"type": "script", "name": "no script"}
        ]}]"#,
    );

    let output = nixtest_cmd().arg("validate").arg(&good).output().unwrap();
    assert!(output.status.success(), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("✓ math (2 tests)"));

    let output = nixtest_cmd().arg("validate").arg(&bad).output().unwrap();
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("s/weird: invalid test type \"fuzz\""));
    assert!(stderr.contains("s/no script: script test has no script derivation"));
}

#[test]
fn schema_is_valid_json() {
    let output = nixtest_cmd().arg("schema").output().unwrap();
    assert!(output.status.success(), "{}", describe(&output));

    let schema: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["type"], "array");
    assert!(schema["definitions"]["TestSpec"].is_object());
}

#[test]
fn config_schema() {
    let output = nixtest_cmd().args(["schema", "--config"]).output().unwrap();
    assert!(output.status.success(), "{}", describe(&output));

    let schema: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema["properties"]["workers"].is_object());
}
