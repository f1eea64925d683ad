use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_file_path(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("panemerge-{prefix}-{nonce}.txt"))
}

#[test]
fn diff_prints_markdown_report() {
    let left = temp_file_path("left-markdown");
    let base = temp_file_path("base-markdown");
    fs::write(&left, "alpha\nold\n").expect("write left");
    fs::write(&base, "alpha\nnew\n").expect("write base");

    let output = Command::new(env!("CARGO_BIN_EXE_panemerge"))
        .arg("diff")
        .arg(&left)
        .arg(&base)
        .output()
        .expect("run panemerge diff");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# Comparison Report"));
    assert!(stdout.contains("## Changes"));
    assert!(stdout.contains("Replaces: 1"));
}

#[test]
fn diff_emits_json_for_three_panes() {
    let left = temp_file_path("left-json");
    let base = temp_file_path("base-json");
    let right = temp_file_path("right-json");
    fs::write(&left, "a\nL\nc\n").expect("write left");
    fs::write(&base, "a\nb\nc\n").expect("write base");
    fs::write(&right, "a\nR\nc\n").expect("write right");

    let output = Command::new(env!("CARGO_BIN_EXE_panemerge"))
        .arg("diff")
        .arg("--json")
        .arg(&left)
        .arg(&base)
        .arg(&right)
        .output()
        .expect("run panemerge diff --json");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["panes"], 3);
    assert_eq!(json["identical"], false);
    assert_eq!(json["conflicts"], serde_json::json!([0]));
}

#[test]
fn diff_filter_hides_matching_text() {
    let left = temp_file_path("left-filter");
    let base = temp_file_path("base-filter");
    fs::write(&left, "value = 1 # old\n").expect("write left");
    fs::write(&base, "value = 1 # new\n").expect("write base");

    let output = Command::new(env!("CARGO_BIN_EXE_panemerge"))
        .arg("diff")
        .arg("--json")
        .arg("--filter")
        .arg("#.*$")
        .arg(&left)
        .arg(&base)
        .output()
        .expect("run panemerge diff --filter");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["identical"], true);
}

#[test]
fn merge_writes_output_file() {
    let local = temp_file_path("local-merge");
    let base = temp_file_path("base-merge");
    let remote = temp_file_path("remote-merge");
    let merged = temp_file_path("merged");
    fs::write(&local, "a\nB\nc\n").expect("write local");
    fs::write(&base, "a\nb\nc\n").expect("write base");
    fs::write(&remote, "a\nb\nC\n").expect("write remote");

    let output = Command::new(env!("CARGO_BIN_EXE_panemerge"))
        .arg("merge")
        .arg(&local)
        .arg(&base)
        .arg(&remote)
        .arg("-o")
        .arg(&merged)
        .output()
        .expect("run panemerge merge");

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(&merged).expect("read merged"),
        "a\nB\nC\n"
    );
}

#[test]
fn merge_reports_unresolved_conflicts() {
    let local = temp_file_path("local-conflict");
    let base = temp_file_path("base-conflict");
    let remote = temp_file_path("remote-conflict");
    fs::write(&local, "x\nL\ny\n").expect("write local");
    fs::write(&base, "x\nb\ny\n").expect("write base");
    fs::write(&remote, "x\nR\ny\n").expect("write remote");

    let output = Command::new(env!("CARGO_BIN_EXE_panemerge"))
        .arg("merge")
        .arg(&local)
        .arg(&base)
        .arg(&remote)
        .output()
        .expect("run panemerge merge");

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "x\n(??)b\ny\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unresolved conflict at line 2"));
}

#[test]
fn diff_fails_for_missing_file() {
    let output = Command::new(env!("CARGO_BIN_EXE_panemerge"))
        .arg("diff")
        .arg("/definitely/missing-left.txt")
        .arg("/definitely/missing-base.txt")
        .output()
        .expect("run panemerge diff");

    assert!(!output.status.success());
}

#[test]
fn replay_fixtures_cli_runs_successfully() {
    let output = Command::new(env!("CARGO_BIN_EXE_panemerge-replay-fixtures"))
        .output()
        .expect("run replay binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("replayed 5 fixture(s)"));
}
