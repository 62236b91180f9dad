// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: closeout with a silent writer and a chatty auditor.

use cpost_core::{AgentId, FakeClock, SupervisorConfig, Task, TaskStatus};
use cpost_engine::{AuditorVerdict, CloseoutManager};
use cpost_storage::{EventLog, MailboxStore, StateDir, TaskStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn writer_timeout_with_auditor_notes_still_succeeds() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    std::fs::write(
        dir.path().join("PRD.md"),
        "---\ntitle: Demo\ncommandPost:\n  status: planned\n---\n# Demo\n\n## Goals\n\nShip it.\n",
    )
    .unwrap();
    TaskStore::new(state.tasks_dir())
        .save(&Task::builder().id("task-1").feature("auth").title("login flow").status(TaskStatus::Approved).build())
        .unwrap();

    let mut config = SupervisorConfig::default();
    config.writer_timeout_ms = 50;
    config.auditor_timeout_ms = 2_000;

    let mailboxes = MailboxStore::new(state.messages_dir());
    let manager = Arc::new(CloseoutManager::new(
        state.clone(),
        mailboxes.clone(),
        EventLog::new(state.events_path()),
        config,
        FakeClock::new(),
    ));

    // The auditor answers as soon as its assignment lands; the writer
    // never does.
    let responder = {
        let manager = Arc::clone(&manager);
        let mailboxes = mailboxes.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                let inbox = mailboxes
                    .read(&AgentId::new("closeout-auditor"))
                    .unwrap_or_default();
                if !inbox.is_empty() {
                    manager.handle_auditor_response("approved_with_notes", None);
                    break;
                }
            }
        })
    };

    let result = manager.run().await;
    responder.abort();

    assert!(result.success);
    assert!(result.actuals_written);
    assert!(result.report_written);
    assert_eq!(result.auditor_verdict, AuditorVerdict::ApprovedWithNotes);
    assert_eq!(
        result.errors,
        vec!["Writer agent timed out — using programmatic fallback".to_string()]
    );

    // PRD carries the built marker and the programmatic actuals
    let prd = std::fs::read_to_string(dir.path().join("PRD.md")).unwrap();
    assert!(prd.contains("  status: built"));
    assert!(prd.contains("## Actuals"));
    assert!(prd.contains("- auth: login flow"));
    assert!(prd.contains("## Goals"));

    // The build report exists and names the task
    let report = std::fs::read_to_string(state.build_report_path()).unwrap();
    assert!(report.contains("task-1"));
}
