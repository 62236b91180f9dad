// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: worker-to-worker messaging policy.

use cpost_core::{AgentId, Message, MessageType, Role};
use cpost_storage::{MailboxStore, SendOptions, StorageError};
use std::collections::HashMap;
use tempfile::TempDir;

fn options(lateral: bool, cc: bool) -> SendOptions {
    let mut known: HashMap<AgentId, Role> = HashMap::new();
    known.insert(AgentId::new("worker-a"), Role::Worker);
    known.insert(AgentId::new("worker-b"), Role::Worker);
    known.insert(AgentId::new("orch-1"), Role::Orchestrator);
    SendOptions {
        lateral_messaging_enabled: lateral,
        cc_orchestrator: cc,
        orchestrator: Some(AgentId::new("orch-1")),
        known_agents: Some(known),
    }
}

#[test]
fn peer_message_reaches_peer_and_ccs_orchestrator_once() {
    let dir = TempDir::new().unwrap();
    let store = MailboxStore::new(dir.path().join("messages"));

    let msg = Message::new("worker-a", "worker-b", MessageType::PeerMessage)
        .with_field("note", "interface changed");
    store
        .send(msg, Role::Worker, &options(true, true), chrono::Utc::now())
        .unwrap();

    let peer_inbox = store.read(&AgentId::new("worker-b")).unwrap();
    let orch_inbox = store.read(&AgentId::new("orch-1")).unwrap();
    assert_eq!(peer_inbox.len(), 1);
    assert_eq!(orch_inbox.len(), 1);
    assert_eq!(peer_inbox[0].body_str("note"), Some("interface changed"));

    // Deduplicated: sending again still delivers exactly one per send
    let msg = Message::new("worker-a", "worker-b", MessageType::PeerMessage);
    store
        .send(msg, Role::Worker, &options(true, true), chrono::Utc::now())
        .unwrap();
    assert_eq!(store.read(&AgentId::new("worker-b")).unwrap().len(), 2);
    assert_eq!(store.read(&AgentId::new("orch-1")).unwrap().len(), 2);
}

#[test]
fn task_assignment_between_workers_is_refused_with_allowed_types() {
    let dir = TempDir::new().unwrap();
    let store = MailboxStore::new(dir.path().join("messages"));

    let msg = Message::new("worker-a", "worker-b", MessageType::TaskAssignment);
    let err = store
        .send(msg, Role::Worker, &options(true, true), chrono::Utc::now())
        .unwrap_err();

    assert!(matches!(err, StorageError::Validation(_)));
    let text = err.to_string();
    for allowed in ["task_update", "peer_message", "escalation", "memory_handoff"] {
        assert!(text.contains(allowed), "missing {allowed} in: {text}");
    }

    // No side effects anywhere
    assert!(store.read(&AgentId::new("worker-b")).unwrap().is_empty());
    assert!(store.read(&AgentId::new("orch-1")).unwrap().is_empty());
}

#[test]
fn disabling_lateral_messaging_blocks_peer_messages() {
    let dir = TempDir::new().unwrap();
    let store = MailboxStore::new(dir.path().join("messages"));

    let msg = Message::new("worker-a", "worker-b", MessageType::PeerMessage);
    let err = store
        .send(msg, Role::Worker, &options(false, false), chrono::Utc::now())
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
}
