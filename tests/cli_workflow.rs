#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

struct Env {
    _temp: TempDir,
    data: std::path::PathBuf,
    backups: std::path::PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        let backups = temp.path().join("backups");
        Self {
            _temp: temp,
            data,
            backups,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(cargo_bin("wordsmaker"));
        cmd.env("WORDSMAKER_DATA_DIR", self.data.as_os_str())
            .env("WORDSMAKER_BACKUP_DIR", self.backups.as_os_str())
            .env("NO_COLOR", "1")
            .env_remove("WORDSMAKER_LOG");
        cmd
    }
}

#[test]
fn test_project_tree_workflow() {
    let env = Env::new();

    env.cmd()
        .args(["new", "My%20Novel", "--type", "novel"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created project My Novel"));

    env.cmd()
        .args(["add", "My Novel", "folder", "Part One"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created folder Part One (1)"));

    env.cmd()
        .args(["add", "My Novel", "file", "Arrival", "--parent", "1"])
        .assert()
        .success();

    env.cmd()
        .args(["write", "My Novel", "2", "The train was late again."])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 words"));

    env.cmd()
        .args(["cat", "My Novel", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The train was late again."));

    env.cmd()
        .args(["tree", "My Novel"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Part One").and(predicate::str::contains("Arrival")));

    env.cmd()
        .args(["projects"])
        .assert()
        .success()
        .stdout(predicate::str::contains("My Novel").and(predicate::str::contains("5 words")));
}

#[test]
fn test_listed_name_is_used_verbatim() {
    let env = Env::new();
    env.cmd()
        .args(["new", "Sales%2520Q%41"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created project Sales%20QA"));

    env.cmd()
        .args(["projects"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sales%20QA"));

    env.cmd()
        .args(["add", "Sales%20QA", "file", "Notes"])
        .assert()
        .success();
    env.cmd()
        .args(["tree", "Sales%20QA"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Notes"));
    env.cmd()
        .args(["backup", "Sales%20QA"])
        .assert()
        .success();
    env.cmd().args(["tree", "Sales QA"]).assert().code(3);
}

#[test]
fn test_cyclic_move_reports_the_action() {
    let env = Env::new();
    env.cmd().args(["new", "Book"]).assert().success();
    env.cmd().args(["add", "Book", "folder", "Outer"]).assert().success();
    env.cmd()
        .args(["add", "Book", "folder", "Inner", "-p", "1"])
        .assert()
        .success();

    env.cmd()
        .args(["mv", "Book", "1", "2"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error moving a file/folder: Invalid move"));
}

#[test]
fn test_delete_missing_node_reports_the_action() {
    let env = Env::new();
    env.cmd().args(["new", "Book"]).assert().success();
    env.cmd()
        .args(["rm", "Book", "9"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Error deleting a file/folder: Not found"));
}

#[test]
fn test_backup_and_restore_workflow() {
    let env = Env::new();
    env.cmd().args(["new", "Book"]).assert().success();
    env.cmd().args(["add", "Book", "file", "One"]).assert().success();
    env.cmd()
        .args(["write", "Book", "1", "original text"])
        .assert()
        .success();

    env.cmd()
        .args(["backup", "Book"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backed up to Book_"));

    let entry = fs::read_dir(&env.backups)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .file_name()
        .to_string_lossy()
        .to_string();

    env.cmd()
        .args(["backup", "Book", "--if-due"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backup due."));

    env.cmd()
        .args(["write", "Book", "1", "replaced text"])
        .assert()
        .success();

    env.cmd()
        .args(["backups", "Book"])
        .assert()
        .success()
        .stdout(predicate::str::contains(entry.as_str()));

    env.cmd()
        .args(["restore", "Book", &entry])
        .assert()
        .success();

    env.cmd()
        .args(["cat", "Book", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("original text"));
}

#[test]
fn test_export_writes_archive() {
    let env = Env::new();
    env.cmd().args(["new", "Book"]).assert().success();
    env.cmd().args(["add", "Book", "file", "One"]).assert().success();

    let out = env.data.join("book.tar.gz");
    env.cmd()
        .args(["export", "Book", "--output", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported to"));
    assert!(fs::metadata(&out).unwrap().len() > 0);
}

#[test]
fn test_settings_roundtrip() {
    let env = Env::new();
    env.cmd()
        .args(["settings", "theme", "dark"])
        .assert()
        .success()
        .stdout(predicate::str::contains("theme set to dark"));

    env.cmd()
        .args(["settings"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("theme = dark")
                .and(predicate::str::contains("font-zoom = 16")),
        );

    env.cmd()
        .args(["settings", "colour", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting"));
}
