// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface specs: exit codes and basic output.

use assert_cmd::Command;
use tempfile::TempDir;

fn cpost(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cpost").expect("cpost binary");
    cmd.arg("--project").arg(dir.path());
    cmd
}

#[test]
fn status_on_an_empty_project_succeeds() {
    let dir = TempDir::new().unwrap();
    let output = cpost(&dir).arg("status").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("agents (0):"));
    assert!(stdout.contains("tasks (0):"));
}

#[test]
fn send_with_disallowed_type_exits_with_validation_code() {
    let dir = TempDir::new().unwrap();
    cpost(&dir)
        .args([
            "send",
            "--from",
            "audit-1",
            "--role",
            "audit",
            "--to",
            "worker-1",
            "--type",
            "task_assignment",
        ])
        .assert()
        .code(2);
}

#[test]
fn allowed_send_lands_in_the_recipient_mailbox() {
    let dir = TempDir::new().unwrap();
    cpost(&dir)
        .args([
            "send",
            "--from",
            "orch-1",
            "--role",
            "orchestrator",
            "--to",
            "worker-1",
            "--type",
            "feedback",
            "--body",
            r#"{"note":"looks good"}"#,
        ])
        .assert()
        .success();

    let mailbox = dir.path().join(".command-post/messages/worker-1.json");
    let text = std::fs::read_to_string(mailbox).unwrap();
    assert!(text.contains("looks good"));
}

#[test]
fn request_agent_for_unknown_domain_exits_with_budget_code() {
    let dir = TempDir::new().unwrap();
    cpost(&dir)
        .args([
            "request-agent",
            "--requested-by",
            "po-1",
            "--domain",
            "atlantis",
            "--role",
            "worker",
            "--reason",
            "test",
        ])
        .assert()
        .code(3);
}
