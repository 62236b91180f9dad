// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: happy-path shutdown across all six tiers.

use super::harness::Harness;
use cpost_core::{EventType, Role, TaskStatus};
use cpost_storage::EventQuery;

#[tokio::test]
async fn full_cascade_ends_in_project_complete() {
    let h = Harness::new();
    h.register("worker-1", Role::Worker, "app");
    h.register("worker-2", Role::Worker, "app");
    h.register("audit-1", Role::Audit, "app");
    h.register("cm-1", Role::ContextMonitor, "app");
    h.register("orch-1", Role::Orchestrator, "app");

    // Two tasks travel the kanban to review
    h.create_task("task-1", "app", "worker-1");
    h.create_task("task-2", "app", "worker-2");
    h.advance_task("task-1", TaskStatus::ReadyForReview);
    h.advance_task("task-2", TaskStatus::ReadyForReview);

    // The monitor routes both reviews to the auditor
    h.completion_monitor.poll_once().unwrap();
    let audit_inbox = h.mailboxes.read(&"audit-1".into()).unwrap();
    assert_eq!(
        audit_inbox
            .iter()
            .filter(|m| m.body_str("action") == Some("review"))
            .count(),
        2
    );

    // Audit passes both with high compliance → auto-approval
    h.file_audit_report("audit-1", "task-1", 0.95);
    h.file_audit_report("audit-1", "task-2", 0.95);
    h.completion_monitor.poll_once().unwrap();
    assert_eq!(h.tasks.get("task-1").unwrap().status, TaskStatus::Approved);
    assert_eq!(h.tasks.get("task-2").unwrap().status, TaskStatus::Approved);

    // Extra polls confirm the cascade is idempotent
    h.completion_monitor.poll_once().unwrap();
    h.completion_monitor.poll_once().unwrap();

    for agent in ["worker-1", "worker-2", "audit-1", "cm-1", "orch-1"] {
        assert_eq!(h.shutdown_count(agent), 1, "{agent} shutdown count");
    }

    let complete = h
        .events
        .query(&EventQuery {
            event_type: Some(EventType::ProjectComplete),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(complete.len(), 1);
    assert_eq!(
        complete[0].data.get("action").and_then(|v| v.as_str()),
        Some("project_complete")
    );
}

#[tokio::test]
async fn no_tier_skips_ahead_of_its_dependencies() {
    let h = Harness::new();
    h.register("worker-1", Role::Worker, "app");
    h.register("audit-1", Role::Audit, "app");
    h.register("cm-1", Role::ContextMonitor, "app");
    h.register("orch-1", Role::Orchestrator, "app");

    // Worker still has an open task: nothing may shut down
    h.create_task("task-1", "app", "worker-1");
    h.advance_task("task-1", TaskStatus::InProgress);
    h.completion_monitor.poll_once().unwrap();

    for agent in ["worker-1", "audit-1", "cm-1", "orch-1"] {
        assert_eq!(h.shutdown_count(agent), 0, "{agent} must still be up");
    }
}
