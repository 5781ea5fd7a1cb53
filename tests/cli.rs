use assert_cmd::Command;
use predicates::prelude::*;

fn pictor() -> Command {
    let mut cmd = Command::cargo_bin("pictor").unwrap();
    // Keep test runs away from the developer's real data and config
    let data_dir = tempfile::tempdir().unwrap();
    cmd.env("PICTOR_DATA_DIR", data_dir.path());
    cmd.env("PICTOR_LOG_LEVEL", "error");
    // Leak the tempdir so it outlives the command run
    std::mem::forget(data_dir);
    cmd
}

#[test]
fn test_cli_version() {
    pictor()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pictor 0.1.0"));
}

#[test]
fn test_cli_help() {
    pictor()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Quota-aware client for a remote image-generation service",
        ));
}

#[test]
fn test_cli_generate_missing_prompt() {
    pictor()
        .arg("generate")
        .assert()
        .failure() // Should fail because 'prompt' argument is required
        .stderr(predicate::str::contains(
            "required arguments were not provided",
        ));
}

#[test]
fn test_cli_generate_without_api_key() {
    pictor()
        .args(["generate", "a red apple"])
        .env_remove("PICTOR_API_KEY")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));
}

#[test]
fn test_cli_usage_report() {
    pictor()
        .arg("usage")
        .assert()
        .success()
        .stdout(predicate::str::contains("generation"))
        .stdout(predicate::str::contains("download"));
}

#[test]
fn test_cli_usage_reset() {
    pictor()
        .args(["usage", "--reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All usage counters reset."));
}

#[test]
fn test_cli_plan_defaults_to_free() {
    pictor()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan: Free"))
        .stdout(predicate::str::contains("100/day"));
}
