//! CLI end-to-end tests
//!
//! Tests for the seiscope command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the seiscope binary
#[allow(deprecated)]
fn seiscope_cmd() -> Command {
    Command::cargo_bin("seiscope").unwrap()
}

/// H.264 SEI NAL unit with one message; payloads here contain no zero runs.
fn sei_nalu(messages: &[(u8, &[u8])]) -> Vec<u8> {
    let mut nalu = vec![0x06];
    for (payload_type, payload) in messages {
        nalu.push(*payload_type);
        nalu.push(payload.len() as u8);
        nalu.extend_from_slice(payload);
    }
    nalu.push(0x80);
    nalu
}

fn annexb(nalus: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for nalu in nalus {
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        out.extend_from_slice(nalu);
    }
    out
}

fn sample_stream() -> Vec<u8> {
    annexb(&[
        vec![0x67, 0x64, 0x00, 0x1F, 0xAC],
        sei_nalu(&[
            (100, br#"{"ts":123,"real_bitrate":4500}"#),
            (101, b"lufs=-23"),
        ]),
        vec![0x65, 0x88, 0x84],
    ])
}

fn write_fixture(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = seiscope_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = seiscope_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("seiscope"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = seiscope_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("seiscope"));
}

#[test]
fn test_cli_extract_help() {
    let mut cmd = seiscope_cmd();
    cmd.args(["extract", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extract SEI messages"));
}

#[test]
fn test_cli_types_lists_table() {
    let mut cmd = seiscope_cmd();
    cmd.arg("types")
        .assert()
        .success()
        .stdout(predicate::str::contains("user_data_unregistered"))
        .stdout(predicate::str::contains("live_metadata"))
        .stdout(predicate::str::contains("content_light_level_info"));
}

#[test]
fn test_cli_detect() {
    let temp = tempdir().unwrap();
    let file = write_fixture(&temp, "stream.h264", &sample_stream());

    let mut cmd = seiscope_cmd();
    cmd.args(["detect", path_str(&file)])
        .assert()
        .success()
        .stdout(predicate::str::contains("H.264 Annex-B"));
}

#[test]
fn test_cli_extract_text() {
    let temp = tempdir().unwrap();
    let file = write_fixture(&temp, "stream.h264", &sample_stream());

    let mut cmd = seiscope_cmd();
    cmd.args(["extract", path_str(&file)])
        .assert()
        .success()
        .stdout(predicate::str::contains("type=100 (live_metadata)"))
        .stdout(predicate::str::contains(r#""real_bitrate":4500"#))
        .stdout(predicate::str::contains("text: lufs=-23"))
        .stdout(predicate::str::contains("Records: 2, errors: 0"));
}

#[test]
fn test_cli_extract_jsonl_with_type_filter() {
    let temp = tempdir().unwrap();
    let file = write_fixture(&temp, "stream.h264", &sample_stream());

    let output = seiscope_cmd()
        .args(["extract", path_str(&file), "--output", "jsonl", "--type", "100", "--no-hex"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);

    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["sei_type"], 100);
    assert_eq!(value["decoded_json"]["real_bitrate"], 4500);
    assert!(value.get("hex").is_none());
}

#[test]
fn test_cli_extract_json_document() {
    let temp = tempdir().unwrap();
    let file = write_fixture(&temp, "stream.h264", &sample_stream());

    let output = seiscope_cmd()
        .args(["extract", path_str(&file), "--output", "json", "--limit", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["format"], "H.264 Annex-B");
    assert_eq!(value["records"].as_array().unwrap().len(), 1);
    assert_eq!(value["records"][0]["hex"].as_str().unwrap().len(), 60);
}

#[test]
fn test_cli_extract_strict_fails_on_malformed_unit() {
    let temp = tempdir().unwrap();
    let data = annexb(&[
        vec![0x06, 0x05, 0x20, 0xAA, 0xBB],
        sei_nalu(&[(5, b"fine")]),
    ]);
    let file = write_fixture(&temp, "broken.h264", &data);

    let mut cmd = seiscope_cmd();
    cmd.args(["extract", "--format", "h264", path_str(&file)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Records: 1, errors: 1"))
        .stderr(predicate::str::contains("Malformed SEI"));

    let mut cmd = seiscope_cmd();
    cmd.args(["extract", "--strict", "--format", "h264", path_str(&file)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn test_cli_extract_format_mismatch() {
    let temp = tempdir().unwrap();
    let file = write_fixture(&temp, "stream.h264", &sample_stream());

    let mut cmd = seiscope_cmd();
    cmd.args(["extract", "--format", "flv", path_str(&file)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not look like FLV"));
}

#[test]
fn test_cli_extract_nonexistent_file() {
    let mut cmd = seiscope_cmd();
    cmd.args(["extract", "/nonexistent/path/stream.flv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_cli_extract_with_config() {
    let temp = tempdir().unwrap();
    let file = write_fixture(&temp, "stream.h264", &sample_stream());
    let config_file = temp.path().join("seiscope.toml");
    fs::write(
        &config_file,
        r#"
[extract]
types = [101]

[output]
format = "jsonl"
hex = false
"#,
    )
    .unwrap();

    let output = seiscope_cmd()
        .args(["--config", path_str(&config_file), "extract", path_str(&file)])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("audio_loudness_detail"));
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("seiscope.toml");
    fs::write(&config_file, "[extract]\nformat = \"flv\"\n").unwrap();

    let mut cmd = seiscope_cmd();
    cmd.args(["validate", path_str(&config_file)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));

    fs::write(&config_file, "[extract]\nformat = \"avi\"\n").unwrap();
    let mut cmd = seiscope_cmd();
    cmd.args(["validate", path_str(&config_file)])
        .assert()
        .failure();
}
