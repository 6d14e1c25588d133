use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch dir holding an empty config, so no user config leaks in
fn scratch() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("narrow.json");
    std::fs::write(&config, "{}").unwrap();
    (dir, config)
}

fn narrow(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("narrow").unwrap();
    cmd.env_remove("NARROW_WORKER")
        .env_remove("NARROW_DEBOUNCE_MS")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("narrow")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("args"));
}

#[test]
fn test_args_prints_grep_invocation() {
    let (dir, config) = scratch();
    let cwd = dir.path().display().to_string();

    narrow(&config)
        .args(["args", "fn main", "--mode", "grep", "--winwidth", "80", "--cwd", &cwd])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(r#"["maple","--number""#))
        .stdout(predicate::str::contains(r#""--winwidth","80""#))
        .stdout(predicate::str::contains(r#""grep","fn main","--cmd""#))
        .stdout(predicate::str::contains("--cmd-dir"));
}

#[test]
fn test_args_rejects_tags_without_files() {
    let (dir, config) = scratch();

    narrow(&config)
        .args(["args", "Foo", "--mode", "tags", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("tag file"));
}

#[test]
fn test_run_with_missing_worker_fails_once() {
    let (dir, config) = scratch();

    narrow(&config)
        .args(["--worker", "narrow-test-no-such-worker", "--debounce-ms", "0"])
        .args(["run", "x", "--mode", "dynamic", "--cmd", "echo hi", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("narrow-test-no-such-worker"));
}

#[cfg(unix)]
#[test]
fn test_run_prints_worker_results() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, config) = scratch();
    let worker = dir.path().join("fake-maple");
    std::fs::write(
        &worker,
        "#!/bin/sh\necho 'not json'\necho '{\"total\":2,\"lines\":[\"hello.rs\",\"help.md\"],\"indices\":[[0,1,2],[0,1,2]]}'\n",
    )
    .unwrap();
    std::fs::set_permissions(&worker, std::fs::Permissions::from_mode(0o755)).unwrap();

    narrow(&config)
        .arg("--worker")
        .arg(&worker)
        .args(["--debounce-ms", "0", "run", "hel", "--mode", "dynamic", "--cmd", "true", "--cwd"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout("hello.rs\nhelp.md\n");
}

#[test]
fn test_serve_survives_bad_requests() {
    let (_dir, config) = scratch();

    narrow(&config)
        .arg("serve")
        .write_stdin("garbage\n{\"method\":\"on_typed\",\"query\":\"x\"}\n{\"method\":\"exit\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
