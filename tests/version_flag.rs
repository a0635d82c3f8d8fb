use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn prints_version() {
    let exe = env!("CARGO_BIN_EXE_zutube");
    let output = Command::new(exe)
        .arg("--version")
        .output()
        .expect("run zutube --version");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "stdout was: {}",
        stdout.trim()
    );
}

#[test]
fn prints_help() {
    Command::cargo_bin("zutube")
        .expect("binary built")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ZuTube"))
        .stdout(predicate::str::contains("--version"))
        .stdout(predicate::str::contains("--demo"));
}

#[test]
fn rejects_unknown_flags() {
    Command::cargo_bin("zutube")
        .expect("binary built")
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument"));
}

#[test]
fn unknown_start_page_fails_before_the_ui() {
    Command::cargo_bin("zutube")
        .expect("binary built")
        .args(["--demo", "/channels/7"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no page at /channels/7"));
}

#[test]
fn logout_without_session_is_a_no_op() {
    let dir = tempdir().expect("tempdir");
    Command::cargo_bin("zutube")
        .expect("binary built")
        .env("ZUTUBE_STORAGE__PATH", dir.path().join("state.db"))
        .arg("--logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));
}
