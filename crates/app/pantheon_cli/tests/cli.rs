use assert_cmd::Command;
use predicates::prelude::*;

fn pantheon(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pantheon").expect("binary");
    cmd.current_dir(dir.path())
        .env("RUST_LOG", "info")
        .env_remove("PANTHEON_DRAIN_TIMEOUT_MS")
        .env_remove("DROPBOX_ACCESS_TOKEN")
        .env_remove("GOOGLE_DRIVE_ACCESS_TOKEN")
        .env_remove("GOOGLE_DRIVE_CREDENTIALS_PATH")
        .env_remove("GOOGLE_DRIVE_TOKEN_PATH");
    cmd
}

#[test]
fn version_prints_the_package_version() {
    let dir = tempfile::tempdir().expect("tempdir");
    pantheon(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("pantheon "));
}

#[test]
fn dropbox_catalog_is_printed_without_credentials() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = pantheon(&dir).args(["tools", "dropbox"]).output().expect("run");
    assert!(output.status.success());

    let tools: serde_json::Value = serde_json::from_slice(&output.stdout).expect("JSON catalog");
    let names: Vec<&str> = tools
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names.len(), 9);
    assert_eq!(names[0], "search_files");
    assert_eq!(names[8], "move_file");
}

#[test]
fn gdrive_catalog_lists_seven_tools() {
    let dir = tempfile::tempdir().expect("tempdir");
    pantheon(&dir)
        .args(["tools", "gdrive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"update_file_content\""))
        .stdout(predicate::str::contains("\"inputSchema\""));
}

#[test]
fn dropbox_without_token_exits_with_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    pantheon(&dir)
        .arg("dropbox")
        .write_stdin("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No credentials available"))
        .stderr(predicate::str::contains("DROPBOX_ACCESS_TOKEN"));
}

#[test]
fn gdrive_reports_every_source_tried() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing_key = dir.path().join("missing-key.json");
    let missing_token = dir.path().join("missing-token.json");
    pantheon(&dir)
        .arg("gdrive")
        .arg("--credentials-path")
        .arg(&missing_key)
        .arg("--token-path")
        .arg(&missing_token)
        .write_stdin("")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "service account file, authorized user token file, env GOOGLE_DRIVE_ACCESS_TOKEN",
        ));
}

#[test]
fn invalid_drain_timeout_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    pantheon(&dir)
        .args(["--drain-timeout-ms", "soon", "dropbox"])
        .assert()
        .code(2);
}
