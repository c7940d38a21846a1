//! CLI integration tests for the commands that need no model

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// `sd` isolated from the user's config and log directories
fn sd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sd").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    sd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("chunks"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
fn test_chunks_text_output() {
    let home = TempDir::new().unwrap();
    let story = home.path().join("story.md");
    fs::write(&story, "# One\nAlice waits.\n# Two\nBob arrives.\n").unwrap();

    sd(&home)
        .args(["chunks", "--story"])
        .arg(&story)
        .args(["--max-chars", "20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chunk 1"))
        .stdout(predicate::str::contains("Chunk 2"))
        .stdout(predicate::str::contains("2 chunk(s)"));
}

#[test]
fn test_chunks_json_output() {
    let home = TempDir::new().unwrap();
    let story = home.path().join("story.md");
    fs::write(&story, "# One\nAlice waits.\n").unwrap();

    let output = sd(&home)
        .args(["chunks", "--format", "json", "--story"])
        .arg(&story)
        .output()
        .unwrap();
    assert!(output.status.success());
    let chunks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(chunks[0]["index"], 1);
    assert_eq!(chunks[0]["text"], "# One\nAlice waits.");
}

#[test]
fn test_chunks_uses_config_file() {
    let home = TempDir::new().unwrap();
    let story = home.path().join("story.md");
    fs::write(&story, "# One\nAlice waits.\n# Two\nBob arrives.\n").unwrap();
    fs::write(home.path().join(".storydelta.yml"), "plan:\n  max-chunk-chars: 20\n").unwrap();

    sd(&home)
        .args(["chunks", "--story"])
        .arg(&story)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 chunk(s)"));
}

#[test]
fn test_diff_command() {
    let home = TempDir::new().unwrap();
    let old = home.path().join("old.md");
    let new = home.path().join("new.md");
    fs::write(&old, "a\nb\nc\n").unwrap();
    fs::write(&new, "a\nx\nc\n").unwrap();

    sd(&home)
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .assert()
        .success()
        .stdout(predicate::str::contains("@@ -2,1 +2,1 @@"))
        .stdout(predicate::str::contains("-b"))
        .stdout(predicate::str::contains("+x"))
        .stdout(predicate::str::contains("+1 -1"));
}

#[test]
fn test_missing_story_fails() {
    let home = TempDir::new().unwrap();
    sd(&home)
        .args(["chunks", "--story", "does-not-exist.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read story file"));
}
