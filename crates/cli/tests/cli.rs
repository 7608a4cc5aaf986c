use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn run_in(cwd: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_decl-e2e"));
    cmd.args(args)
        .current_dir(cwd)
        .env("RUST_LOG", "off")
        .env("NO_COLOR", "1");
    cmd.output().expect("run decl-e2e")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn validate_accepts_well_formed_suite() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("suite.json"),
        r#"{"health": {"tests": [{"verb": "get", "url": "/health", "expect": 200}]}}"#,
    )
    .expect("write suite");

    let output = run_in(dir.path(), &["validate", "suite.json"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("ok (1 tests)"));
}

#[test]
fn validate_rejects_group_without_tests() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("suite.json"), r#"{"group1": {"notTests": []}}"#)
        .expect("write suite");

    let output = run_in(dir.path(), &["validate", "suite.json"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("group1"), "stderr: {}", stderr(&output));
}

#[test]
fn validate_reports_unreadable_suite() {
    let dir = tempfile::tempdir().expect("tempdir");

    let output = run_in(dir.path(), &["validate", "missing.json"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to read suite"));
}

#[test]
fn config_prints_defaults_without_file() {
    let dir = tempfile::tempdir().expect("tempdir");

    let output = run_in(dir.path(), &["config"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let rendered = stdout(&output);
    assert!(rendered.contains("timeout_secs = 30"));
    assert!(rendered.contains("token_field = \"id\""));
}

#[test]
fn config_reads_local_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("decl-e2e.toml"),
        "[suite]\nbaseUrl = \"/api\"\n\n[client]\ntimeout_secs = 5\n",
    )
    .expect("write config");

    let output = run_in(dir.path(), &["config"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let rendered = stdout(&output);
    assert!(rendered.contains("/api"));
    assert!(rendered.contains("timeout_secs = 5"));
}
