//! Exit-code contract of the relax binary: 0 clean, 1 bugs, 2 usage.

use std::process::Command;

fn relax() -> Command {
    Command::new(env!("CARGO_BIN_EXE_relax"))
}

#[test]
fn clean_program_exits_zero() {
    let out = relax().args(["run", "sb"]).output().unwrap();
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("complete"), "stdout: {stdout}");
}

#[test]
fn buggy_program_exits_one() {
    let out = relax().args(["run", "deadlock"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("deadlock"), "stdout: {stdout}");
    assert!(stdout.contains("trace of first buggy execution"), "stdout: {stdout}");
}

#[test]
fn unknown_program_exits_two() {
    let out = relax().args(["run", "nonesuch"]).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn usage_error_exits_two() {
    let out = relax().args(["frobnicate"]).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn list_names_every_program() {
    let out = relax().arg("list").output().unwrap();
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    for name in ["sb", "mp", "rmw", "promise", "deadlock", "rwlock"] {
        assert!(stdout.contains(name), "missing {name} in: {stdout}");
    }
}
