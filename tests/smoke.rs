//! Smoke tests -- verify the binary runs and subcommands are wired up.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("speedledger")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "Gated internet speed measurements",
        ));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("speedledger")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("speedledger"));
}

#[test]
fn test_run_subcommand_exists() {
    Command::cargo_bin("speedledger")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success();
}

#[test]
fn test_gate_subcommand_exists() {
    Command::cargo_bin("speedledger")
        .unwrap()
        .args(["gate", "--help"])
        .assert()
        .success();
}

#[test]
fn test_config_subcommand_prints_defaults() {
    Command::cargo_bin("speedledger")
        .unwrap()
        .arg("config")
        .assert()
        .success()
        .stdout(predicates::str::contains("speed_tests.txt"))
        .stdout(predicates::str::contains("keep_running.txt"));
}

#[test]
fn test_run_without_credentials_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let config_path = dir.path().join("speedledger.toml");
    std::fs::write(
        &config_path,
        format!(
            "[storage]\ndata_dir = '{}'\n",
            dir.path().join("data").display()
        ),
    )
    .unwrap();

    Command::cargo_bin("speedledger")
        .unwrap()
        .args(["run", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicates::str::contains("credentials missing"));
}
