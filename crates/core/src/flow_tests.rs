// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agent::Role;

#[test]
fn new_flow_starts_idle() {
    let flow = ReplacementFlow::new(
        "worker-1",
        "context critical",
        Role::Worker,
        "backend",
        vec!["task-1".to_string()],
        Utc::now(),
    );
    assert_eq!(flow.phase, FlowPhase::Idle);
    assert_eq!(flow.retry_count, 0);
    assert!(flow.flow_id.as_str().starts_with("flow-"));
}

#[yare::parameterized(
    idle      = { FlowPhase::Idle, false },
    requested = { FlowPhase::SnapshotRequested, false },
    spawned   = { FlowPhase::ReplacementSpawned, false },
    completed = { FlowPhase::Completed, true },
    failed    = { FlowPhase::Failed, true },
)]
fn terminal_flow_phases(phase: FlowPhase, expected: bool) {
    assert_eq!(phase.is_terminal(), expected);
}

#[test]
fn flow_roundtrips() {
    let mut flow = ReplacementFlow::new(
        "worker-2",
        "manual",
        Role::Specialist,
        "frontend",
        vec![],
        Utc::now(),
    );
    flow.phase = FlowPhase::SnapshotValidated;
    flow.best_quality_score = 0.45;

    let json = serde_json::to_string(&flow).unwrap();
    let parsed: ReplacementFlow = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.phase, FlowPhase::SnapshotValidated);
    assert_eq!(parsed.best_quality_score, 0.45);
}
