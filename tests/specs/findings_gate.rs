// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: a critical finding blocks the cascade until resolved.

use super::harness::Harness;
use cpost_core::{AgentId, Role, TaskStatus};

#[tokio::test]
async fn critical_finding_blocks_then_resolution_resumes() {
    let h = Harness::new();
    h.register("worker-3", Role::Worker, "frontend");
    h.register("audit-1", Role::Audit, "frontend");
    h.register("security-1", Role::Security, "frontend");
    h.register("orch-1", Role::Orchestrator, "frontend");

    // Security files a critical finding against the domain
    let finding = h
        .findings
        .register(
            "frontend",
            AgentId::new("security-1"),
            Role::Security,
            Some("task-7".to_string()),
            "critical",
            "security",
            "token leaks in client bundle",
            Some("strip tokens at build time".to_string()),
        )
        .unwrap();
    assert_eq!(h.findings.blocked_domains(), vec!["frontend"]);

    // Worker finishes everything, yet no shutdown arrives
    h.create_task("task-7", "frontend", "worker-3");
    h.advance_task("task-7", TaskStatus::ReadyForReview);
    h.file_audit_report("audit-1", "task-7", 0.95);
    h.completion_monitor.poll_once().unwrap();
    h.completion_monitor.poll_once().unwrap();

    assert_eq!(h.tasks.get("task-7").unwrap().status, TaskStatus::Approved);
    assert_eq!(h.shutdown_count("worker-3"), 0);

    // A remediation task is created and linked to the finding
    h.findings.link_task(&finding, "task-R").unwrap();
    h.create_task("task-R", "frontend", "worker-3");
    h.advance_task("task-R", TaskStatus::ReadyForReview);

    // Its audit passes → finding auto-resolves → held agents released
    h.file_audit_report("audit-1", "task-R", 0.9);
    h.completion_monitor.poll_once().unwrap();

    assert!(!h.findings.has_blocking_findings("frontend"));
    assert_eq!(h.shutdown_count("worker-3"), 1);

    // And the cascade continues above the workers
    h.completion_monitor.poll_once().unwrap();
    assert_eq!(h.shutdown_count("audit-1"), 1);
    assert_eq!(h.shutdown_count("security-1"), 1);
    assert_eq!(h.shutdown_count("orch-1"), 1);
}
