//! Smoke tests -- verify the binary runs and key subcommands exist.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("gaswarden")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "Appliance-grade gas-leak monitoring",
        ));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("gaswarden")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("gaswarden"));
}

#[test]
fn test_analyze_subcommand_exists() {
    Command::cargo_bin("gaswarden")
        .unwrap()
        .args(["analyze", "--help"])
        .assert()
        .success();
}

#[test]
fn test_incidents_subcommand_exists() {
    Command::cargo_bin("gaswarden")
        .unwrap()
        .args(["incidents", "--help"])
        .assert()
        .success();
}

#[test]
fn test_simulate_writes_readings() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("smoke.db");

    Command::cargo_bin("gaswarden")
        .unwrap()
        .args([
            "simulate",
            "--device",
            "smoke-01",
            "--count",
            "10",
            "--db",
            db.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("Wrote 10 synthetic readings"));
}
