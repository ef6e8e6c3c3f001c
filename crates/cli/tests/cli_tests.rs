use assert_cmd::Command;
use predicates::prelude::*;

fn novelmill() -> Command {
    let mut cmd = Command::cargo_bin("novelmill").unwrap();
    cmd.env_remove("DATABASE_URL")
        .env_remove("NOVELMILL_API_KEY")
        .env_remove("NOVELMILL_EMBEDDINGS_URL")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_cli_help() {
    novelmill()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Serialized long-form fiction generator"))
        .stdout(predicate::str::contains("advance"))
        .stdout(predicate::str::contains("batch"));
}

#[test]
fn test_advance_help_lists_count() {
    novelmill().args(["advance", "--help"]).assert().success().stdout(predicate::str::contains("count"));
}

#[test]
fn test_migrate_requires_database_url() {
    novelmill()
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn test_advance_requires_api_key() {
    novelmill()
        .args(["advance", "ninth-gate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOVELMILL_API_KEY"));
}

#[test]
fn test_init_requires_protagonist() {
    novelmill()
        .args(["init", "ninth-gate", "--title", "The Ninth Gate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--protagonist"));
}

#[test]
fn test_init_without_database_prints_project() {
    novelmill()
        .args(["init", "ninth-gate", "--title", "The Ninth Gate", "--protagonist", "Lin"])
        .args(["--chapters", "120"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"protagonist\": \"Lin\""))
        .stdout(predicate::str::contains("\"planned_chapters\": 120"));
}

#[test]
fn test_status_on_empty_store() {
    novelmill().arg("status").assert().success().stdout(predicate::str::contains("[]"));
}

#[test]
fn test_batch_rejects_bad_task_spec() {
    novelmill()
        .args(["batch", "ninth-gate:lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid chapter count"));
}
