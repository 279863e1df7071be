//! Command-line contract.

use std::fs;
use std::path::Path;

use assert_cmd::Command;

fn kindred() -> Command {
    let mut cmd = Command::cargo_bin("kindred").expect("binary builds");
    cmd.env_remove("RUST_LOG");
    for var in [
        "KINDRED_MODEL",
        "KINDRED_OLLAMA_URL",
        "KINDRED_TASTE_URL",
        "KINDRED_TASTE_TIMEOUT_SECS",
        "KINDRED_DEFAULT_CHANNEL",
        "KINDRED_DATABASE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let db = dir.join("kindred.db");
    fs::write(
        &path,
        format!("[storage]\ndatabase = {:?}\n{extra}", db.display().to_string()),
    )
    .expect("write config");
    path
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn help_lists_subcommands() {
    let output = kindred().arg("--help").output().expect("run");
    assert!(output.status.success());
    let text = stdout(&output);
    for sub in ["chat", "introduce", "import-directory", "check"] {
        assert!(text.contains(sub), "missing {sub} in:\n{text}");
    }
}

#[test]
fn check_reports_missing_credentials() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), "");

    let output = kindred()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .output()
        .expect("run");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("taste api key: missing"));
    assert!(text.contains("bot token:     missing"));
    assert!(text.contains("kindred.db"));
}

#[test]
fn check_rejects_invalid_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), "[dispatch]\ntop_n = 0\n");

    let output = kindred()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .output()
        .expect("run");
    assert!(!output.status.success());
}

#[test]
fn import_directory_stores_profiles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), "");
    let profiles = dir.path().join("profiles.json");
    fs::write(
        &profiles,
        r#"[
            {"name": "Ana", "contact": "ana@example.com", "role": "Designer"},
            {"name": "Bo", "contact": "bo@example.com", "department": "Design"}
        ]"#,
    )
    .expect("write profiles");

    let output = kindred()
        .arg("--config")
        .arg(&config)
        .arg("import-directory")
        .arg(&profiles)
        .output()
        .expect("run");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("imported 2 profiles"));
    assert!(dir.path().join("kindred.db").exists());
}

#[test]
fn introduce_without_taste_key_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), "");
    let request = dir.path().join("request.json");
    fs::write(
        &request,
        r#"{"employee": {"name": "Ana"}, "candidates": [{"name": "Bo"}]}"#,
    )
    .expect("write request");

    let output = kindred()
        .arg("--config")
        .arg(&config)
        .arg("introduce")
        .arg(&request)
        .output()
        .expect("run");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("taste graph API key"));
}
