//! CLI surface smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn keytrace() -> Command {
    let mut cmd = Command::cargo_bin("keytrace").unwrap();
    // Keep host configuration out of the picture.
    cmd.env_remove("KEYTRACE_SETTINGS")
        .env_remove("KEYTRACE_RULES")
        .env_remove("KEYTRACE_CONFIG_DIR")
        .env_remove("KEYTRACE_LOG_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    keytrace()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn version_prints_version() {
    keytrace()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keytrace"));
}

#[test]
fn check_with_builtin_defaults() {
    keytrace()
        .env("KEYTRACE_CONFIG_DIR", "/nonexistent-keytrace-config")
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("libwvdrmengine.so"))
        .stdout(predicate::str::contains("unbounded"));
}

#[test]
fn check_json_payload() {
    let output = keytrace()
        .env("KEYTRACE_CONFIG_DIR", "/nonexistent-keytrace-config")
        .args(["check", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["module_name"], "libwvdrmengine.so");
    assert_eq!(payload["max_attempts"], serde_json::Value::Null);
    assert!(payload["rules"].as_u64().unwrap() >= 1);
}

#[test]
fn check_reads_explicit_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let rules = dir.path().join("rules.json");
    std::fs::write(&config, "module_name = \"libcustomcdm.so\"\nmax_attempts = 12\n").unwrap();
    std::fs::write(&rules, r#"[{ "match": "contains", "pattern": "customcdm" }]"#).unwrap();

    keytrace()
        .arg("check")
        .arg("--config")
        .arg(&config)
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("libcustomcdm.so"))
        .stdout(predicate::str::contains("up to 12"))
        .stdout(predicate::str::contains("CLI argument"));
}

#[test]
fn check_rejects_missing_explicit_config() {
    keytrace()
        .arg("check")
        .arg("--config")
        .arg("/nonexistent/config.toml")
        .assert()
        .code(11);
}

#[test]
fn check_rejects_invalid_rules() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules.json");
    std::fs::write(&rules, r#"[{ "match": "regex", "pattern": "([" }]"#).unwrap();

    keytrace()
        .arg("check")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .code(11);
}

#[cfg(target_os = "linux")]
#[test]
fn scan_reports_absent_module() {
    keytrace()
        .env("KEYTRACE_CONFIG_DIR", "/nonexistent-keytrace-config")
        .args([
            "scan",
            "--pid",
            &std::process::id().to_string(),
            "--module",
            "libdoesnotexist.so",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("not present"));
}

#[cfg(target_os = "linux")]
#[test]
fn check_probes_backend_capabilities() {
    keytrace()
        .env("KEYTRACE_CONFIG_DIR", "/nonexistent-keytrace-config")
        .args(["check", "--pid", &std::process::id().to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("interception=false"));
}

#[cfg(target_os = "linux")]
#[test]
fn run_against_missing_process_fails_attach() {
    keytrace()
        .env("KEYTRACE_CONFIG_DIR", "/nonexistent-keytrace-config")
        .args(["run", "--pid", "4194000", "--max-attempts", "1"])
        .assert()
        .code(14);
}
