use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::cargo_bin("showland")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("showland")
        .unwrap()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Showland"))
        .stdout(predicate::str::contains("--offline"))
        .stdout(predicate::str::contains("--query"));
}

#[test]
fn rejects_unknown_flag() {
    Command::cargo_bin("showland")
        .unwrap()
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument: --bogus"));
}

#[test]
fn query_without_value_is_an_error() {
    Command::cargo_bin("showland")
        .unwrap()
        .arg("--query")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--query needs a value"));
}
