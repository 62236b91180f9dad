// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_transcript(lines: &[&str]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("transcript.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    (dir, path)
}

#[test]
fn latest_assistant_usage_wins() {
    let (_dir, path) = write_transcript(&[
        r#"{"type":"assistant","message":{"usage":{"input_tokens":100,"output_tokens":10,"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}"#,
        r#"{"type":"user","message":{"content":"tool result"}}"#,
        r#"{"type":"assistant","message":{"usage":{"input_tokens":2000,"output_tokens":50,"cache_creation_input_tokens":300,"cache_read_input_tokens":140000}}}"#,
    ]);

    let usage = read_latest_usage(&path).unwrap();
    assert_eq!(usage.input_tokens, 2000);
    assert_eq!(usage.cache_read_tokens, 140_000);
    assert_eq!(usage.context_tokens(), 142_300);
}

#[test]
fn output_tokens_are_excluded_from_occupancy() {
    let (_dir, path) = write_transcript(&[
        r#"{"type":"assistant","message":{"usage":{"input_tokens":50000,"output_tokens":90000,"cache_creation_input_tokens":0,"cache_read_input_tokens":50000}}}"#,
    ]);

    let usage = read_latest_usage(&path).unwrap();
    assert_eq!(usage.output_tokens, 90_000);
    assert_eq!(usage.context_tokens(), 100_000);
    assert!((usage.percentage(200_000) - 0.5).abs() < f64::EPSILON);
}

#[test]
fn assistant_record_without_usage_is_skipped() {
    let (_dir, path) = write_transcript(&[
        r#"{"type":"assistant","message":{"usage":{"input_tokens":777,"output_tokens":1,"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Done!"}]}}"#,
    ]);

    let usage = read_latest_usage(&path).unwrap();
    assert_eq!(usage.input_tokens, 777);
}

#[test]
fn malformed_lines_are_skipped_silently() {
    let (_dir, path) = write_transcript(&[
        r#"{"type":"assistant","message":{"usage":{"input_tokens":42,"output_tokens":0,"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}"#,
        r#"{"type":"assistant","message":{"usage":{"input_tokens":"#,
        "not json at all",
    ]);

    let usage = read_latest_usage(&path).unwrap();
    assert_eq!(usage.input_tokens, 42);
}

#[test]
fn empty_file_yields_no_reading() {
    let (_dir, path) = write_transcript(&[]);
    assert!(read_latest_usage(&path).is_none());
}

#[test]
fn missing_file_yields_no_reading() {
    assert!(read_latest_usage(Path::new("/nonexistent/transcript.jsonl")).is_none());
}

#[test]
fn top_level_usage_is_accepted() {
    let (_dir, path) = write_transcript(&[
        r#"{"type":"assistant","usage":{"input_tokens":11,"output_tokens":2,"cache_creation_input_tokens":3,"cache_read_input_tokens":4}}"#,
    ]);

    let usage = read_latest_usage(&path).unwrap();
    assert_eq!(usage.context_tokens(), 18);
}

#[yare::parameterized(
    zero_max = { 0, 0.0 },
    half     = { 200, 0.5 },
)]
fn percentage_handles_max(max: u64, expected: f64) {
    let usage = TranscriptUsage {
        input_tokens: 100,
        ..Default::default()
    };
    assert_eq!(usage.percentage(max), expected);
}
