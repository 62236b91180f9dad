// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cpost_core::{ContextUsage, MemorySnapshot};
use tempfile::TempDir;

fn store() -> (TempDir, SnapshotStore) {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("memory-snapshots"));
    (dir, store)
}

fn machine_snapshot(agent: &str, pct: f64, at: DateTime<Utc>) -> MemorySnapshot {
    let usage = ContextUsage::new((pct * 200_000.0) as u64, 200_000);
    MemorySnapshot::from_reading(agent, usage, at)
}

#[test]
fn create_writes_capture_and_latest() {
    let (_dir, store) = store();
    let agent = AgentId::new("worker-1");

    let id = store
        .create(&agent, &machine_snapshot("worker-1", 0.4, Utc::now()), Utc::now())
        .unwrap();

    let latest = store.get_latest(&agent).unwrap().unwrap();
    assert_eq!(
        latest.get("snapshot_id").and_then(Value::as_str),
        Some(id.as_str())
    );
    assert_eq!(
        latest.get("agent_id").and_then(Value::as_str),
        Some("worker-1")
    );
}

#[test]
fn snapshots_are_immutable_and_latest_tracks_newest() {
    let (_dir, store) = store();
    let agent = AgentId::new("worker-1");
    let base = Utc::now();

    let mut ids = Vec::new();
    for i in 0..3 {
        let now = base + chrono::Duration::seconds(i);
        let id = store
            .create(&agent, &machine_snapshot("worker-1", 0.1 * i as f64, now), now)
            .unwrap();
        ids.push(id);
    }

    // Three distinct capture files exist
    let captures = store.query(&agent, None, None).unwrap();
    assert_eq!(captures.len(), 3);

    // Latest matches the most recent create
    let latest = store.get_latest(&agent).unwrap().unwrap();
    assert_eq!(
        latest.get("snapshot_id").and_then(Value::as_str),
        Some(ids[2].as_str())
    );
}

#[test]
fn same_instant_creates_do_not_overwrite() {
    let (_dir, store) = store();
    let agent = AgentId::new("worker-1");
    let now = Utc::now();

    store
        .create(&agent, &machine_snapshot("worker-1", 0.1, now), now)
        .unwrap();
    store
        .create(&agent, &machine_snapshot("worker-1", 0.2, now), now)
        .unwrap();

    assert_eq!(store.query(&agent, None, None).unwrap().len(), 2);
}

#[test]
fn get_latest_absent_agent_is_none() {
    let (_dir, store) = store();
    assert!(store.get_latest(&AgentId::new("nobody")).unwrap().is_none());
}

#[test]
fn retention_keeps_at_most_five() {
    let (_dir, store) = store();
    let agent = AgentId::new("worker-1");
    let base = Utc::now();

    for i in 0..8 {
        let now = base + chrono::Duration::seconds(i);
        store
            .create(&agent, &machine_snapshot("worker-1", 0.1, now), now)
            .unwrap();
    }

    let captures = store.query(&agent, None, None).unwrap();
    assert_eq!(captures.len(), 5);

    // The survivors are the five newest
    let latest = store.get_latest(&agent).unwrap().unwrap();
    let newest_ts = captures
        .last()
        .and_then(|c| c.get("timestamp"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap();
    assert_eq!(
        latest.get("timestamp").and_then(Value::as_str),
        Some(newest_ts.as_str())
    );
}

#[test]
fn retention_is_per_agent() {
    let (_dir, store) = store();
    let base = Utc::now();

    for i in 0..7 {
        let now = base + chrono::Duration::seconds(i);
        store
            .create(&AgentId::new("worker-1"), &machine_snapshot("worker-1", 0.1, now), now)
            .unwrap();
    }
    store
        .create(&AgentId::new("worker-2"), &machine_snapshot("worker-2", 0.1, base), base)
        .unwrap();

    assert_eq!(store.query(&AgentId::new("worker-1"), None, None).unwrap().len(), 5);
    assert_eq!(store.query(&AgentId::new("worker-2"), None, None).unwrap().len(), 1);
}

#[test]
fn query_filters_by_time_range_ascending() {
    let (_dir, store) = store();
    let agent = AgentId::new("worker-1");
    let base = Utc::now();

    for i in 0..4 {
        let now = base + chrono::Duration::seconds(i * 10);
        store
            .create(&agent, &machine_snapshot("worker-1", 0.1, now), now)
            .unwrap();
    }

    let hits = store
        .query(
            &agent,
            Some(base + chrono::Duration::seconds(5)),
            Some(base + chrono::Duration::seconds(25)),
        )
        .unwrap();
    assert_eq!(hits.len(), 2);

    let stamps: Vec<&str> = hits
        .iter()
        .filter_map(|d| d.get("timestamp").and_then(Value::as_str))
        .collect();
    let mut sorted = stamps.clone();
    sorted.sort();
    assert_eq!(stamps, sorted);
}

#[test]
fn malformed_capture_files_are_skipped() {
    let (_dir, store) = store();
    let agent = AgentId::new("worker-1");
    store
        .create(&agent, &machine_snapshot("worker-1", 0.1, Utc::now()), Utc::now())
        .unwrap();

    std::fs::write(store.dir.join("worker-1-garbage.json"), "{broken").unwrap();
    assert_eq!(store.query(&agent, None, None).unwrap().len(), 1);
}

#[yare::parameterized(
    machine = { serde_json::json!({"context_usage": {"percentage": 0.82}}), Some(0.82) },
    prd     = { serde_json::json!({"context_at_snapshot": 0.71}), Some(0.71) },
    neither = { serde_json::json!({"state": {}}), None },
)]
fn percentage_extraction(doc: Value, expected: Option<f64>) {
    assert_eq!(snapshot_percentage(&doc), expected);
}
