//! End-to-end tests for the `package-mirror completions` command.

mod common;
use common::prelude::*;

#[test]
fn test_completions_help() {
    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("completions")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Generate shell completion scripts",
        ))
        .stdout(predicate::str::contains("bash"))
        .stdout(predicate::str::contains("powershell"));
}

#[test]
fn test_completions_bash() {
    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("completions")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("_package-mirror()"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("tree"));
}

#[test]
fn test_completions_zsh() {
    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("completions")
        .arg("zsh")
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef package-mirror"));
}

#[test]
fn test_completions_invalid_shell() {
    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("completions").arg("tcsh").assert().code(2);
}
