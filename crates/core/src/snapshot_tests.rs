// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn machine_snapshot_from_reading_has_unknowns_empty() {
    let usage = ContextUsage::new(120_000, 200_000);
    let snap = MemorySnapshot::from_reading("worker-1", usage, Utc::now());

    assert_eq!(snap.agent_id, "worker-1");
    assert!(snap.decision_log.is_empty());
    assert!(snap.task_status.is_none());
    assert!(!snap.snapshot_id.as_str().is_empty());
}

#[test]
fn prd_snapshot_roundtrips() {
    let mut snap = PrdSnapshot::skeletal("worker-2", 1);
    snap.next_steps.push("wire the cache layer".to_string());
    snap.decisions.push(SnapshotDecision {
        decision: "use sqlite".to_string(),
        rationale: Some("single-file deploys".to_string()),
        impact: None,
    });
    snap.files_state.in_progress.push("src/cache.rs".to_string());

    let json = serde_json::to_string(&snap).unwrap();
    let parsed: PrdSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.handoff_number, 1);
    assert_eq!(parsed.next_steps.len(), 1);
    assert_eq!(parsed.decisions[0].rationale.as_deref(), Some("single-file deploys"));
}

#[test]
fn files_state_all_files_spans_sections() {
    let fs = FilesState {
        completed: vec!["a.rs".to_string()],
        in_progress: vec!["b.rs".to_string()],
        not_started: vec!["c.rs".to_string()],
    };
    let all: Vec<_> = fs.all_files().cloned().collect();
    assert_eq!(all, vec!["a.rs", "b.rs", "c.rs"]);
}

#[test]
fn snapshot_state_emptiness() {
    assert!(SnapshotState::default().is_empty());
    let state = SnapshotState {
        current_step: Some("step 3".to_string()),
        ..Default::default()
    };
    assert!(!state.is_empty());
}
