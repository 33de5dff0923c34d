//! Integration tests for the `tq` binary.
//!
//! These use `assert_cmd` and `predicates` to exercise the CLI end to end:
//! stdin and file input, the benchmark flag, result streaming, and the
//! error/exit-code contract.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

fn tq() -> Command {
    Command::cargo_bin("tq").unwrap()
}

/// Helper: write a TOON fixture to a temp file and return its path.
fn fixture(contents: &str) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ─────────────────────────────────────────────────────────────────────────────
// Querying stdin
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn query_from_stdin() {
    tq().arg(".name")
        .write_stdin("name: Alice\nage: 30")
        .assert()
        .success()
        .stdout("Alice\n");
}

#[test]
fn stream_results_one_per_line() {
    tq().arg(".users[].email")
        .write_stdin("users[2]{email}:\n  a@x\n  b@y")
        .assert()
        .success()
        .stdout("a@x\nb@y\n");
}

#[test]
fn dash_reads_stdin() {
    tq().args([".n", "-"])
        .write_stdin("n: 7")
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn empty_stream_produces_no_output() {
    tq().arg(".[] | select(. > 9)")
        .write_stdin("[2]: 1,2")
        .assert()
        .success()
        .stdout("");
}

// ─────────────────────────────────────────────────────────────────────────────
// Querying files
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn query_from_file() {
    let file = fixture("items[3]: 1,2,3\n");
    tq().args([".items | add", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout("6\n");
}

#[test]
fn container_results_serialize_as_toon() {
    let file = fixture("users[2]{id,name}:\n  1,Alice\n  2,Bob\n");
    tq().args([".users[0]", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout("id: 1\nname: Alice\n");
}

#[test]
fn missing_file_fails_with_message() {
    tq().args([".", "/no/such/file.toon"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("/no/such/file.toon"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Benchmark flag
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn benchmark_reports_time_and_count() {
    tq().args(["-b", ".[]"])
        .write_stdin("[3]: 1,2,3")
        .assert()
        .success()
        .stdout("1\n2\n3\n")
        .stderr(predicate::str::contains("Execution time:"))
        .stderr(predicate::str::contains("Results: 3"));
}

#[test]
fn long_benchmark_flag() {
    tq().args(["--benchmark", "length"])
        .write_stdin("[2]: 1,2")
        .assert()
        .success()
        .stderr(predicate::str::contains("Results: 1"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and usage
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn help_shows_usage() {
    tq().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("expression"));
}

#[test]
fn missing_expression_is_usage_error() {
    tq().assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Error contract: exit 1, message on stderr
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn parse_error_exits_one() {
    tq().arg(".foo |")
        .write_stdin("a: 1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn eval_error_exits_one() {
    tq().arg("1/0")
        .write_stdin("null")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Division by zero"));
}

#[test]
fn toon_error_exits_one() {
    tq().arg(".")
        .write_stdin("bad[9]: 1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("TOON parse error"));
}

#[test]
fn unknown_function_exits_one() {
    tq().arg("nonsense_fn")
        .write_stdin("null")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unknown function"));
}
