// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cpost_core::{ContextUsage, FakeClock, MemorySnapshot, RegistryEntry, Task};
use cpost_storage::StateDir;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    manager: HandoffManager<FakeClock>,
    tasks: TaskStore,
    snapshots: SnapshotStore,
    mailboxes: MailboxStore,
    registry: AgentRegistry,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    let clock = FakeClock::new();
    let tasks = TaskStore::new(state.tasks_dir());
    let snapshots = SnapshotStore::new(state.snapshots_dir());
    let mailboxes = MailboxStore::new(state.messages_dir());
    let registry = AgentRegistry::new(state.registry_path());
    let manager = HandoffManager::open(
        HandoffStateStore::new(state.handoff_state_path()),
        tasks.clone(),
        snapshots.clone(),
        mailboxes.clone(),
        registry.clone(),
        EventLog::new(state.events_path()),
        clock.clone(),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        manager,
        tasks,
        snapshots,
        mailboxes,
        registry,
        clock,
    }
}

fn seed_agent(f: &Fixture, agent: &str, usage_pct: f64) {
    f.registry
        .upsert(AgentId::new(agent), RegistryEntry::builder().build())
        .unwrap();
    let usage = ContextUsage::new((usage_pct * 200_000.0) as u64, 200_000);
    f.snapshots
        .create(
            &AgentId::new(agent),
            &MemorySnapshot::from_reading(agent, usage, f.clock.now_utc()),
            f.clock.now_utc(),
        )
        .unwrap();
}

fn seed_task(f: &Fixture, id: &str, owner: &str, status: TaskStatus) {
    let mut task = Task::builder().id(id).status(status).build();
    task.assigned_to = Some(AgentId::new(owner));
    f.tasks.save(&task).unwrap();
}

#[test]
fn initiate_and_complete_transfers_tasks() {
    let f = fixture();
    seed_agent(&f, "worker-1", 0.85);
    seed_agent(&f, "worker-2", 0.20);
    seed_task(&f, "task-1", "worker-1", TaskStatus::InProgress);
    seed_task(&f, "task-2", "worker-1", TaskStatus::Assigned);

    let source = AgentId::new("worker-1");
    let target = AgentId::new("worker-2");
    let ids = vec!["task-1".to_string(), "task-2".to_string()];

    f.manager
        .initiate(&source, "context critical", None, ids.clone())
        .unwrap();
    assert!(f.manager.has_pending(&source));

    f.manager.complete(&source, &target, &ids).unwrap();

    for id in &ids {
        let task = f.tasks.get(id).unwrap();
        assert_eq!(task.assigned_to.as_ref().unwrap(), &target);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.context.handoff_count, 1);
        assert!(task.context.decision_log[0].starts_with("Handoff from worker-1"));
    }

    // Target received the memory_handoff message carrying the snapshot
    let inbox = f.mailboxes.read(&target).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message_type, MessageType::MemoryHandoff);
    assert!(inbox[0].body.contains_key("snapshot"));

    // Source registry handoff count incremented
    assert_eq!(f.registry.get(&source).unwrap().unwrap().handoff_count, 1);

    // Handoff no longer pending
    assert!(!f.manager.has_pending(&source));
}

#[test]
fn validation_failures_change_nothing() {
    let f = fixture();
    seed_agent(&f, "worker-1", 0.85);
    // worker-1 has no tasks and the task does not exist

    let result = f.manager.initiate(
        &AgentId::new("worker-1"),
        "test",
        None,
        vec!["task-ghost".to_string()],
    );
    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert!(!f.manager.has_pending(&AgentId::new("worker-1")));
}

#[test]
fn non_transferable_task_fails_validation() {
    let f = fixture();
    seed_agent(&f, "worker-1", 0.85);
    seed_task(&f, "task-1", "worker-1", TaskStatus::Approved);

    let validation = f
        .manager
        .validate(&AgentId::new("worker-1"), None, &["task-1".to_string()])
        .unwrap();
    assert!(!validation.valid);
    assert!(validation.errors.iter().any(|e| e.contains("not transferable")));
}

#[test]
fn source_without_snapshot_fails_validation() {
    let f = fixture();
    seed_task(&f, "task-1", "worker-1", TaskStatus::InProgress);

    let validation = f
        .manager
        .validate(&AgentId::new("worker-1"), None, &["task-1".to_string()])
        .unwrap();
    assert!(!validation.valid);
    assert!(validation.errors.iter().any(|e| e.contains("no snapshot")));
}

#[test]
fn target_in_critical_state_fails_validation() {
    let f = fixture();
    seed_agent(&f, "worker-1", 0.85);
    seed_agent(&f, "worker-2", 0.90);
    seed_task(&f, "task-1", "worker-1", TaskStatus::InProgress);

    let validation = f
        .manager
        .validate(
            &AgentId::new("worker-1"),
            Some(&AgentId::new("worker-2")),
            &["task-1".to_string()],
        )
        .unwrap();
    assert!(!validation.valid);
    assert!(validation.errors.iter().any(|e| e.contains("critical")));
}

#[test]
fn circular_handoff_is_rejected() {
    let f = fixture();
    seed_agent(&f, "worker-a", 0.85);
    seed_agent(&f, "worker-b", 0.30);
    seed_task(&f, "task-1", "worker-a", TaskStatus::InProgress);
    seed_task(&f, "task-2", "worker-b", TaskStatus::InProgress);

    let a = AgentId::new("worker-a");
    let b = AgentId::new("worker-b");

    f.manager
        .initiate(&a, "test", Some(b.clone()), vec!["task-1".to_string()])
        .unwrap();

    // B → A while A → B is pending
    let result = f
        .manager
        .initiate(&b, "test", Some(a.clone()), vec!["task-2".to_string()]);
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[test]
fn partial_failure_rolls_back_transferred_tasks() {
    let f = fixture();
    seed_agent(&f, "worker-1", 0.85);
    seed_agent(&f, "worker-2", 0.20);
    seed_task(&f, "task-1", "worker-1", TaskStatus::InProgress);

    let source = AgentId::new("worker-1");
    let target = AgentId::new("worker-2");

    f.manager
        .initiate(&source, "test", None, vec!["task-1".to_string()])
        .unwrap();

    // task-ghost was never created; the second update fails
    let ids = vec!["task-1".to_string(), "task-ghost".to_string()];
    let result = f.manager.complete(&source, &target, &ids);
    assert!(result.is_err());

    // task-1 was rolled back to the source
    let task = f.tasks.get("task-1").unwrap();
    assert_eq!(task.assigned_to.as_ref().unwrap(), &source);
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task
        .context
        .decision_log
        .iter()
        .any(|d| d.contains("Rolled back")));

    // No handoff message was delivered
    assert!(f.mailboxes.read(&target).unwrap().is_empty());
}

#[test]
fn cancel_only_from_initiated() {
    let f = fixture();
    seed_agent(&f, "worker-1", 0.85);
    seed_task(&f, "task-1", "worker-1", TaskStatus::InProgress);

    let source = AgentId::new("worker-1");
    f.manager
        .initiate(&source, "test", None, vec!["task-1".to_string()])
        .unwrap();
    f.manager.cancel(&source).unwrap();
    assert!(!f.manager.has_pending(&source));

    assert!(matches!(
        f.manager.cancel(&source),
        Err(EngineError::NotFound(_)) | Err(EngineError::Consistency(_))
    ));
}

#[test]
fn history_records_every_transition() {
    let f = fixture();
    seed_agent(&f, "worker-1", 0.85);
    seed_agent(&f, "worker-2", 0.20);
    seed_task(&f, "task-1", "worker-1", TaskStatus::InProgress);

    let source = AgentId::new("worker-1");
    let target = AgentId::new("worker-2");
    let ids = vec!["task-1".to_string()];

    f.manager.initiate(&source, "test", None, ids.clone()).unwrap();
    f.clock.advance(std::time::Duration::from_secs(5));
    f.manager.complete(&source, &target, &ids).unwrap();

    let history = f.manager.query_history(&source, None, None);
    let phases: Vec<HandoffPhase> = history.iter().map(|t| t.phase).collect();
    assert_eq!(phases, vec![HandoffPhase::Initiated, HandoffPhase::Completed]);

    // The target's view includes the completion
    let target_history = f.manager.query_history(&target, None, None);
    assert_eq!(target_history.len(), 1);
}

#[test]
fn state_resumes_after_restart() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    let clock = FakeClock::new();
    let make = || {
        HandoffManager::open(
            HandoffStateStore::new(state.handoff_state_path()),
            TaskStore::new(state.tasks_dir()),
            SnapshotStore::new(state.snapshots_dir()),
            MailboxStore::new(state.messages_dir()),
            AgentRegistry::new(state.registry_path()),
            EventLog::new(state.events_path()),
            clock.clone(),
        )
        .unwrap()
    };

    {
        let f = Fixture {
            _dir: TempDir::new().unwrap(),
            manager: make(),
            tasks: TaskStore::new(state.tasks_dir()),
            snapshots: SnapshotStore::new(state.snapshots_dir()),
            mailboxes: MailboxStore::new(state.messages_dir()),
            registry: AgentRegistry::new(state.registry_path()),
            clock: clock.clone(),
        };
        seed_agent(&f, "worker-1", 0.85);
        seed_task(&f, "task-1", "worker-1", TaskStatus::InProgress);
        f.manager
            .initiate(&AgentId::new("worker-1"), "test", None, vec!["task-1".to_string()])
            .unwrap();
    }

    let resumed = make();
    assert!(resumed.has_pending(&AgentId::new("worker-1")));
}
