// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: snapshot retries exhaust and the flow force-handoffs.

use super::harness::Harness;
use cpost_core::{AgentId, Clock, MessageType, PrdSnapshot, Role, TaskStatus};
use cpost_storage::MessageQuery;
use std::time::Duration;

fn write_poor_snapshot(h: &Harness, agent: &str) {
    h.clock.advance(Duration::from_secs(10));
    let mut snapshot = PrdSnapshot::skeletal(agent, 0);
    snapshot.task_id = Some("task-1".to_string());
    h.snapshots
        .create(&AgentId::new(agent), &snapshot, h.clock.now_utc())
        .unwrap();
}

#[tokio::test]
async fn third_poor_snapshot_forces_the_handoff() {
    let h = Harness::new();
    h.register("worker-1", Role::Worker, "app");
    h.register("orch-1", Role::Orchestrator, "app");
    h.create_task("task-1", "app", "worker-1");
    h.advance_task("task-1", TaskStatus::InProgress);

    // The monitor observes a red reading through its transcript
    let transcript = h.dir.path().join("worker-1.jsonl");
    std::fs::write(
        &transcript,
        r#"{"type":"assistant","message":{"usage":{"input_tokens":164000,"output_tokens":10,"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}"#,
    )
    .unwrap();
    h.registry
        .update(|agents| {
            if let Some(entry) = agents.get_mut(&AgentId::new("worker-1")) {
                entry.transcript_path = Some(transcript.clone());
            }
        })
        .unwrap();

    h.context_monitor.poll_once().await.unwrap();
    assert!(h.coordinator.is_replacement_active(&AgentId::new("worker-1")));

    // The agent answers three times with a snapshot missing next_steps
    for _ in 0..3 {
        write_poor_snapshot(&h, "worker-1");
        h.coordinator.poll().await;
    }

    // Replacement exists and took the task
    let replacement = AgentId::new("worker-1-r1");
    assert!(h.registry.get(&replacement).unwrap().is_some());
    assert_eq!(
        h.tasks.get("task-1").unwrap().assigned_to.as_ref().unwrap(),
        &replacement
    );
    assert_eq!(h.executor.executed().len(), 1);

    // Original told to shut down
    assert_eq!(h.shutdown_count("worker-1"), 1);

    // Orchestrator sees the forced handoff
    let updates = h
        .mailboxes
        .query(
            &AgentId::new("orch-1"),
            &MessageQuery {
                message_type: Some(MessageType::TaskUpdate),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(updates
        .iter()
        .any(|m| m.body.get("forced").and_then(|v| v.as_bool()) == Some(true)));
}
