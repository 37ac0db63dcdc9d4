use assert_cmd::prelude::*;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_digest_target(dir: &Path, secret: &str) -> PathBuf {
    let path = dir.join("report.sha256");
    fs::write(&path, hex::encode(Sha256::digest(secret.as_bytes()))).unwrap();
    path
}

fn json_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .map(|e| e.path().extension().is_some_and(|x| x == "json"))
                .unwrap_or(false)
        })
        .count()
}

#[test]
fn e2e_finds_numeric_pin_and_writes_result() {
    let tmp = tempdir().unwrap();
    let target = write_digest_target(tmp.path(), "0042");
    let result = tmp.path().join("found.txt");

    let mut cmd = Command::cargo_bin("doccrack").unwrap();
    cmd.arg(&target)
        .args(["-t", "numeric", "-l", "4", "-w", "2", "--color", "never"])
        .arg("--output")
        .arg(&result);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("FOUND"))
        .stdout(predicate::str::contains("Candidate: 0042"));

    let written = fs::read_to_string(&result).unwrap();
    assert!(written.contains("candidate: 0042"));
    // Success leaves no checkpoint behind.
    assert_eq!(json_files(tmp.path()), 0);
}

#[test]
fn e2e_exhausted_exits_one_and_checkpoints() {
    let tmp = tempdir().unwrap();
    let target = write_digest_target(tmp.path(), "not-a-pin");
    let ckpt = tmp.path().join("ckpt");

    let mut cmd = Command::cargo_bin("doccrack").unwrap();
    cmd.arg(&target)
        .args(["-t", "digits", "--min", "1", "--max", "2", "-q"])
        .arg("--checkpoint-dir")
        .arg(&ckpt);
    cmd.assert().code(1).stdout(predicate::str::is_empty());
    assert_eq!(json_files(&ckpt), 2);

    // Second run skips the exhausted spaces and still reports not found.
    let mut again = Command::cargo_bin("doccrack").unwrap();
    again
        .arg(&target)
        .args(["-t", "digits", "--min", "1", "--max", "2", "--color", "never"])
        .arg("--checkpoint-dir")
        .arg(&ckpt);
    again
        .assert()
        .code(1)
        .stdout(predicate::str::contains("NOT FOUND"))
        .stdout(predicate::str::contains("Skipped spaces: 2"));
}

#[test]
fn e2e_missing_target_fails() {
    let tmp = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("doccrack").unwrap();
    cmd.arg(tmp.path().join("absent.pdf")).arg("-q");
    cmd.assert().code(1).stdout(predicate::str::is_empty());
}

#[test]
fn e2e_command_oracle_without_command_fails() {
    let tmp = tempdir().unwrap();
    let target = write_digest_target(tmp.path(), "1234");
    let mut cmd = Command::cargo_bin("doccrack").unwrap();
    cmd.arg(&target).args(["--oracle", "command", "-q"]);
    cmd.assert().code(1);
}

#[test]
fn e2e_saved_config_drives_later_run() {
    let tmp = tempdir().unwrap();
    let target = write_digest_target(tmp.path(), "cab");
    let config = tmp.path().join("settings.json");

    // Save settings from a run that cannot succeed (digits only).
    let mut first = Command::cargo_bin("doccrack").unwrap();
    first
        .arg(&target)
        .args(["-t", "numeric", "-l", "1", "--ignore-checkpoint", "-q"])
        .arg("--save-config")
        .arg(&config);
    first.assert().code(1);
    let saved = fs::read_to_string(&config).unwrap();
    assert!(saved.contains("\"numeric\""));

    // Rewrite the strategy in the file and let it drive the next run.
    let edited = saved.replace("\"numeric\"", "\"alphabetic\"");
    fs::write(&config, edited).unwrap();
    let mut second = Command::cargo_bin("doccrack").unwrap();
    second
        .arg(&target)
        .args(["-l", "3", "--no-uppercase", "--color", "never"])
        .arg("--config")
        .arg(&config);
    second
        .assert()
        .success()
        .stdout(predicate::str::contains("Candidate: cab"))
        .stdout(predicate::str::contains("Alphabetic"));
}

#[test]
fn e2e_wordlist_with_transforms() {
    let tmp = tempdir().unwrap();
    let target = write_digest_target(tmp.path(), "Summer");
    let words = tmp.path().join("words.txt");
    fs::write(&words, "winter\nsummer\nautumn\n").unwrap();

    let mut cmd = Command::cargo_bin("doccrack").unwrap();
    cmd.arg(&target)
        .args(["-t", "wordlist", "--transform", "capitalize", "--color", "never"])
        .arg("--wordlist")
        .arg(&words);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Candidate: Summer"))
        .stdout(predicate::str::contains("WordList"));
}

#[test]
fn e2e_unusable_checkpoint_interval_fails_cleanly() {
    let tmp = tempdir().unwrap();
    let target = write_digest_target(tmp.path(), "0042");
    for interval in ["inf", "1e300"] {
        let mut cmd = Command::cargo_bin("doccrack").unwrap();
        cmd.env_remove("RUST_LOG")
            .arg(&target)
            .args(["-t", "numeric", "-l", "4", "-q", "--checkpoint-interval", interval]);
        cmd.assert()
            .code(1)
            .stderr(predicate::str::contains("checkpoint interval"))
            .stderr(predicate::str::contains("panicked").not());
    }
}

#[test]
fn e2e_log_file_receives_log_output() {
    let tmp = tempdir().unwrap();
    let target = write_digest_target(tmp.path(), "0042");
    let log = tmp.path().join("logs").join("run.log");

    let mut cmd = Command::cargo_bin("doccrack").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg(&target)
        .args(["-t", "numeric", "-l", "4", "-q", "-v"])
        .arg("--log-file")
        .arg(&log);
    cmd.assert().success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("Strategy FixedLengthDigits"), "{text}");
    assert!(text.contains("Match at position 42"), "{text}");
}
