//! End-to-end tests for `ferry parse`
//!
//! The dry run needs no database, so these run the real binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn ferry() -> Command {
    let mut cmd = Command::cargo_bin("ferry").unwrap();
    cmd.env_remove("LOG_LEVEL").env_remove("LOG_OUTPUT");
    cmd
}

#[test]
fn test_parse_valid_users_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.csv");
    fs::write(&path, "id,email,name\n1,a@x.com,A\n2,b@x.com,B\n").unwrap();

    ferry()
        .args(["parse", "--product", "users", "--batch-size", "1"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 records in 2 batches, valid users"));
}

#[test]
fn test_parse_prints_records_as_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("courses.tsv");
    fs::write(&path, "id\ttitle\n7\tRust\n").unwrap();

    ferry()
        .args(["parse", "--print"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"id":"7","title":"Rust"}"#));
}

#[test]
fn test_parse_reports_missing_field() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orgs.csv");
    fs::write(&path, "id,name\n1,Acme\n2,\n").unwrap();

    ferry()
        .args(["parse", "--product", "organizations"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("record 1 missing required field name"));
}

#[test]
fn test_parse_missing_file() {
    ferry()
        .args(["parse", "/definitely/not/here.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot open"));
}

#[test]
fn test_subcommand_required() {
    ferry().assert().failure();
}
