use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn cli_version() {
    Command::cargo_bin("threads-run")
        .unwrap()
        .args(["-V"])
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_runs_batch_and_prints_stats() {
    Command::cargo_bin("threads-run")
        .unwrap()
        .args([
            "--workers",
            "3",
            "--queue-depth",
            "4",
            "--jobs",
            "12",
            "--max-sleep-ms",
            "5",
            "--poll-ms",
            "10",
            "--json",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""workers":3"#)
                .and(predicate::str::contains(r#""queue_depth":4"#))
                .and(predicate::str::contains(r#""completed":12"#))
                .and(predicate::str::contains(r#""state":"Drained""#)),
        );
}

#[test]
fn cli_without_json_prints_nothing_on_stdout() {
    Command::cargo_bin("threads-run")
        .unwrap()
        .args(["--workers", "2", "--jobs", "4", "--max-sleep-ms", "1"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn cli_rejects_zero_workers() {
    Command::cargo_bin("threads-run")
        .unwrap()
        .args(["--workers", "0", "--jobs", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker count must be positive"));
}

#[test]
fn cli_rejects_invalid_number() {
    Command::cargo_bin("threads-run")
        .unwrap()
        .args(["--jobs", "many"])
        .assert()
        .failure();
}
