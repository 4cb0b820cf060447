use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn silent_sweep_reports_every_tone() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pleasant-progress"));
    cmd.args(["sweep", "--steps", "4", "--interval-ms", "150", "--no-audio"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"steps\": 4"))
        .stdout(predicate::str::contains("\"requests_published\": 5"))
        .stdout(predicate::str::contains("\"native_beeps\": 0"))
        .stdout(predicate::str::contains("\"enabled\": true"));
}

#[test]
fn sweep_uses_the_configured_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("progress.json");
    std::fs::write(&path, r#"{"max_cache_entries": 7, "clip_duration_secs": 0.02}"#)
        .expect("write config");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pleasant-progress"));
    cmd.arg("--config")
        .arg(&path)
        .args(["sweep", "--steps", "2", "--interval-ms", "80", "--no-audio"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"requests_published\": 3"))
        .stdout(predicate::str::contains("\"capacity\": 7"));
}
