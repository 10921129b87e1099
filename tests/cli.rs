//! CLI surface tests for the `pfence` binary
//!
//! Spawns the compiled binary with assert_cmd against hermetic assert_fs
//! fixtures; JSON output is parsed structurally rather than string-matched.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

const SR_RESPONSE: &str = "\
hello.txt
```
<<<<<<< SEARCH
old line
=======
new line
>>>>>>> REPLACE
```
";

fn fixture_with_response() -> assert_fs::TempDir {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("hello.txt")
        .write_str("old line\n")
        .expect("write hello.txt");
    tmp.child("resp.md")
        .write_str(SR_RESPONSE)
        .expect("write resp.md");
    tmp
}

#[test]
fn parse_lists_recognized_blocks() {
    let tmp = fixture_with_response();

    Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("parse")
        .arg("resp.md")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello.txt"))
        .stdout(predicate::str::contains("search/replace"));
}

#[test]
fn parse_json_is_structured() {
    let tmp = fixture_with_response();

    let assert = Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("parse")
        .arg("resp.md")
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let v: Value = serde_json::from_str(&stdout).expect("json");
    let blocks = v.get("blocks").and_then(Value::as_array).expect("blocks");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["file_path"], "hello.txt");
    assert_eq!(blocks[0]["edit_type"], "search_replace");
}

#[test]
fn apply_defaults_to_preview_and_writes_nothing() {
    let tmp = fixture_with_response();

    Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("apply")
        .arg("resp.md")
        .assert()
        .success()
        .stderr(predicate::str::contains("Safety mode"));

    // Preview must not touch the target.
    tmp.child("hello.txt").assert("old line\n");
}

#[test]
fn apply_with_flag_writes_changes() {
    let tmp = fixture_with_response();

    Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("apply")
        .arg("resp.md")
        .arg("--root")
        .arg(tmp.path())
        .arg("--apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("applied hello.txt"));

    tmp.child("hello.txt").assert("new line\n");
}

#[test]
fn dry_run_overrides_apply() {
    let tmp = fixture_with_response();

    Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("--dry-run")
        .arg("apply")
        .arg("resp.md")
        .arg("--root")
        .arg(tmp.path())
        .arg("--apply")
        .assert()
        .success();

    tmp.child("hello.txt").assert("old line\n");
}

#[test]
fn failed_file_yields_exit_code_two() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("hello.txt")
        .write_str("something else entirely\n")
        .expect("write hello.txt");
    tmp.child("resp.md")
        .write_str(SR_RESPONSE)
        .expect("write resp.md");

    let assert = Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("apply")
        .arg("resp.md")
        .arg("--root")
        .arg(tmp.path())
        .arg("--apply")
        .arg("--json")
        .assert()
        .code(2);

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let v: Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(v["hello.txt"], false);
}

#[test]
fn init_writes_default_config_once() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success();

    tmp.child("patchfence.toml")
        .assert(predicate::str::contains("strip_preambles"));

    // Second init without --force must refuse to overwrite.
    Command::cargo_bin("pfence")
        .expect("bin")
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .failure();
}
