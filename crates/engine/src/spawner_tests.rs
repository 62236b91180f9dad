// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cpost_core::{FakeClock, FilesState, SnapshotDecision, SnapshotState};
use tempfile::TempDir;

fn snapshot() -> PrdSnapshot {
    PrdSnapshot {
        agent_id: "worker-1".into(),
        task_id: Some("task-1".to_string()),
        handoff_number: 1,
        context_at_snapshot: Some(0.82),
        state: SnapshotState {
            current_step: Some("cache layer".to_string()),
            progress_summary: Some("storage done, cache half-wired".to_string()),
            completion_estimate: Some("60%".to_string()),
        },
        decisions: vec![SnapshotDecision {
            decision: "use sqlite".to_string(),
            rationale: Some("single file".to_string()),
            impact: Some("no server".to_string()),
        }],
        gotchas: vec!["WAL cleanup on crash".to_string()],
        files_state: FilesState {
            completed: vec!["src/store.rs".to_string()],
            in_progress: vec!["src/cache.rs".to_string()],
            not_started: vec![],
        },
        next_steps: vec!["finish eviction".to_string(), "wire metrics".to_string()],
        dependencies_discovered: vec!["needs tokio-util".to_string()],
    }
}

fn spawner(dir: &TempDir) -> ReplacementSpawner<FakeClock> {
    let state = StateDir::new(dir.path());
    ReplacementSpawner::new(
        state.clone(),
        MailboxStore::new(state.messages_dir()),
        SpawnRequestStore::new(state.spawn_requests_dir()),
        EventLog::new(state.events_path()),
        FakeClock::new(),
    )
}

#[test]
fn prepare_prepends_handoff_context_to_original_instructions() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    let original = AgentId::new("worker-1");
    let replacement = AgentId::new("worker-1-r1");

    let original_path = state.instructions_path(&original);
    std::fs::create_dir_all(original_path.parent().unwrap()).unwrap();
    std::fs::write(&original_path, "# Worker instructions\nBuild the cache.\n").unwrap();

    let spawner = spawner(&dir);
    let request = spawner
        .prepare(&original, &replacement, &snapshot(), 1, "worker", "backend", vec![])
        .unwrap();

    let written = std::fs::read_to_string(state.instructions_path(&replacement)).unwrap();
    assert!(written.starts_with("# Memory Handoff Context (Handoff #1)"));
    assert!(written.contains("Build the cache."));
    assert!(written.contains("use sqlite"));
    assert!(written.contains("WAL cleanup"));
    assert!(written.contains("1. finish eviction"));
    assert_eq!(request.prepared_instructions, written);
}

#[test]
fn prepare_survives_missing_original_instructions() {
    let dir = TempDir::new().unwrap();
    let spawner = spawner(&dir);

    let request = spawner
        .prepare(
            &AgentId::new("worker-9"),
            &AgentId::new("worker-9-r1"),
            &snapshot(),
            1,
            "worker",
            "backend",
            vec![],
        )
        .unwrap();
    assert!(request
        .prepared_instructions
        .starts_with("# Memory Handoff Context"));
}

#[test]
fn prepare_deposits_greeting_and_writes_request() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    let spawner = spawner(&dir);
    let replacement = AgentId::new("worker-1-r1");

    let request = spawner
        .prepare(
            &AgentId::new("worker-1"),
            &replacement,
            &snapshot(),
            1,
            "worker",
            "backend",
            vec!["task-1".to_string()],
        )
        .unwrap();

    let inbox = MailboxStore::new(state.messages_dir())
        .read(&replacement)
        .unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message_type, MessageType::MemoryHandoff);
    assert_eq!(inbox[0].body_str("event"), Some("replacement_initialized"));

    let pending = SpawnRequestStore::new(state.spawn_requests_dir())
        .list()
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request_id, request.request_id);
    assert_eq!(pending[0].task_ids, vec!["task-1"]);
}

#[yare::parameterized(
    first  = { "worker-1", 1, "worker-1-r1" },
    deeper = { "worker-1-r1", 2, "worker-1-r2" },
    jump   = { "worker-1-r7", 9, "worker-1-r9" },
)]
fn replacement_ids_never_stack(original: &str, n: u32, expected: &str) {
    assert_eq!(
        ReplacementSpawner::<FakeClock>::replacement_id(&AgentId::new(original), n),
        expected
    );
}

#[test]
fn render_includes_all_populated_sections() {
    let text = render_handoff_context(&snapshot(), 3);
    assert!(text.contains("(Handoff #3)"));
    for heading in [
        "## Current State",
        "## Decisions",
        "## Gotchas",
        "## File State",
        "## Next Steps",
        "## Dependencies Discovered",
    ] {
        assert!(text.contains(heading), "missing {heading}");
    }
}

#[test]
fn render_omits_empty_sections() {
    let text = render_handoff_context(&PrdSnapshot::skeletal("worker-1", 0), 0);
    assert!(text.contains("(Handoff #0)"));
    assert!(!text.contains("## Decisions"));
    assert!(!text.contains("## Next Steps"));
}
