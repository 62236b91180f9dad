// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cpost_adapters::FakeSpawnExecutor;
use cpost_core::{
    FakeClock, FilesState, MessageType, SnapshotDecision, SnapshotState, TaskStatus,
};
use cpost_storage::{HandoffStateStore, MessageQuery};
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    coordinator: ReplacementCoordinator<FakeClock>,
    executor: Arc<FakeSpawnExecutor>,
    mailboxes: MailboxStore,
    snapshots: SnapshotStore,
    tasks: TaskStore,
    registry: AgentRegistry,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    let clock = FakeClock::new();
    let mailboxes = MailboxStore::new(state.messages_dir());
    let snapshots = SnapshotStore::new(state.snapshots_dir());
    let tasks = TaskStore::new(state.tasks_dir());
    let registry = AgentRegistry::new(state.registry_path());
    let events = EventLog::new(state.events_path());
    let requests = SpawnRequestStore::new(state.spawn_requests_dir());
    let executor = Arc::new(FakeSpawnExecutor::new());

    let handoff = Arc::new(
        HandoffManager::open(
            HandoffStateStore::new(state.handoff_state_path()),
            tasks.clone(),
            snapshots.clone(),
            mailboxes.clone(),
            registry.clone(),
            events.clone(),
            clock.clone(),
        )
        .unwrap(),
    );
    let spawner = ReplacementSpawner::new(
        state.clone(),
        mailboxes.clone(),
        requests.clone(),
        events.clone(),
        clock.clone(),
    );
    let coordinator = ReplacementCoordinator::new(
        SupervisorConfig::default(),
        state,
        mailboxes.clone(),
        snapshots.clone(),
        tasks.clone(),
        registry.clone(),
        requests,
        events,
        handoff,
        spawner,
        Some(executor.clone() as Arc<dyn SpawnExecutor>),
        AgentId::new("orch-1"),
        clock.clone(),
    );

    Fixture {
        _dir: dir,
        coordinator,
        executor,
        mailboxes,
        snapshots,
        tasks,
        registry,
        clock,
    }
}

fn seed_worker(f: &Fixture, agent: &str, task: &str) {
    f.registry
        .upsert(AgentId::new(agent), RegistryEntry::builder().build())
        .unwrap();
    let mut t = cpost_core::Task::builder()
        .id(task)
        .status(TaskStatus::InProgress)
        .build();
    t.assigned_to = Some(AgentId::new(agent));
    f.tasks.save(&t).unwrap();
}

fn good_snapshot(agent: &str, task: &str) -> PrdSnapshot {
    PrdSnapshot {
        agent_id: agent.into(),
        task_id: Some(task.to_string()),
        handoff_number: 0,
        context_at_snapshot: Some(0.82),
        state: SnapshotState {
            current_step: Some("cache layer".to_string()),
            progress_summary: Some("storage done".to_string()),
            completion_estimate: Some("70%".to_string()),
        },
        decisions: vec![SnapshotDecision {
            decision: "use sqlite".to_string(),
            rationale: Some("single file".to_string()),
            impact: None,
        }],
        gotchas: vec!["WAL cleanup".to_string()],
        files_state: FilesState {
            completed: vec!["src/store.rs".to_string()],
            in_progress: vec![],
            not_started: vec![],
        },
        next_steps: vec!["finish eviction".to_string()],
        dependencies_discovered: vec![],
    }
}

fn poor_snapshot(agent: &str, task: &str) -> PrdSnapshot {
    let mut snapshot = PrdSnapshot::skeletal(agent, 0);
    snapshot.task_id = Some(task.to_string());
    snapshot
}

fn agent_writes(f: &Fixture, agent: &str, snapshot: &PrdSnapshot) {
    f.clock.advance(Duration::from_secs(10));
    f.snapshots
        .create(&AgentId::new(agent), snapshot, f.clock.now_utc())
        .unwrap();
}

fn lifecycle_commands(f: &Fixture, agent: &str) -> Vec<String> {
    f.mailboxes
        .query(
            &AgentId::new(agent),
            &MessageQuery {
                message_type: Some(MessageType::LifecycleCommand),
                ..Default::default()
            },
        )
        .unwrap()
        .iter()
        .filter_map(|m| m.body_str("command").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn request_snapshot_opens_flow_and_messages_agent() {
    let f = fixture();
    seed_worker(&f, "worker-1", "task-1");

    let usage = ContextUsage::new(164_000, 200_000);
    f.coordinator
        .request_snapshot(&AgentId::new("worker-1"), "context critical", Some(usage))
        .unwrap();

    assert!(f.coordinator.is_replacement_active(&AgentId::new("worker-1")));

    let inbox = f.mailboxes.read(&AgentId::new("worker-1")).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].priority, Priority::Critical);
    assert_eq!(inbox[0].body_str("command"), Some("write_memory_snapshot"));
    assert_eq!(
        inbox[0].body_str("deadline"),
        Some("complete_current_atomic_operation")
    );

    // Orchestrator was notified
    assert_eq!(f.mailboxes.read(&AgentId::new("orch-1")).unwrap().len(), 1);

    // Only one flow per agent
    assert!(matches!(
        f.coordinator
            .request_snapshot(&AgentId::new("worker-1"), "again", None),
        Err(EngineError::Consistency(_))
    ));
}

#[tokio::test]
async fn good_snapshot_completes_the_protocol() {
    let f = fixture();
    seed_worker(&f, "worker-1", "task-1");
    let worker = AgentId::new("worker-1");

    f.coordinator
        .request_snapshot(&worker, "context critical", None)
        .unwrap();
    agent_writes(&f, "worker-1", &good_snapshot("worker-1", "task-1"));

    f.coordinator.poll().await;

    // Flow archived as completed
    assert!(!f.coordinator.is_replacement_active(&worker));
    let completed = f.coordinator.completed_flows();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].phase, FlowPhase::Completed);

    // Replacement registered and spawned
    let replacement = AgentId::new("worker-1-r1");
    assert!(f.registry.get(&replacement).unwrap().is_some());
    assert_eq!(f.executor.executed().len(), 1);

    // Task moved to the replacement
    let task = f.tasks.get("task-1").unwrap();
    assert_eq!(task.assigned_to.as_ref().unwrap(), &replacement);
    assert_eq!(task.context.handoff_count, 1);

    // Original told to shut down
    assert!(lifecycle_commands(&f, "worker-1").contains(&"prepare_shutdown".to_string()));
}

#[tokio::test]
async fn poor_snapshots_retry_then_force_handoff() {
    let f = fixture();
    seed_worker(&f, "worker-1", "task-1");
    let worker = AgentId::new("worker-1");

    f.coordinator
        .request_snapshot(&worker, "context critical", None)
        .unwrap();

    // Three poor snapshots in a row
    for round in 0..3 {
        agent_writes(&f, "worker-1", &poor_snapshot("worker-1", "task-1"));
        f.coordinator.poll().await;

        if round < 2 {
            let flow = f.coordinator.flow(&worker).unwrap();
            assert_eq!(flow.phase, FlowPhase::SnapshotRequested);
            assert_eq!(flow.retry_count, round + 1);
        }
    }

    // Third failure force-handoffs with the poor snapshot
    assert!(!f.coordinator.is_replacement_active(&worker));
    assert!(f.registry.get(&AgentId::new("worker-1-r1")).unwrap().is_some());
    assert!(lifecycle_commands(&f, "worker-1").contains(&"prepare_shutdown".to_string()));

    // Orchestrator sees forced: true on the completion notice
    let updates = f
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

#[tokio::test]
async fn retry_message_enumerates_failed_checks() {
    let f = fixture();
    seed_worker(&f, "worker-1", "task-1");
    let worker = AgentId::new("worker-1");

    f.coordinator
        .request_snapshot(&worker, "context critical", None)
        .unwrap();
    agent_writes(&f, "worker-1", &poor_snapshot("worker-1", "task-1"));
    f.coordinator.poll().await;

    let requests = lifecycle_commands(&f, "worker-1");
    assert_eq!(requests.len(), 2); // original + retry

    let inbox = f.mailboxes.read(&worker).unwrap();
    let retry = inbox.last().unwrap();
    let failed = retry.body_str("failed_checks").unwrap();
    assert!(failed.contains("next_steps"));
    assert!(failed.contains("state_populated"));
}

#[tokio::test]
async fn missing_snapshot_fails_the_flow_and_escalates() {
    let f = fixture();
    seed_worker(&f, "worker-1", "task-1");
    let worker = AgentId::new("worker-1");

    f.coordinator
        .request_snapshot(&worker, "context critical", None)
        .unwrap();

    let result = f.coordinator.process_snapshot(&worker).await;
    assert!(result.is_err());
    assert!(!f.coordinator.is_replacement_active(&worker));

    let completed = f.coordinator.completed_flows();
    assert_eq!(completed[0].phase, FlowPhase::Failed);

    let escalations = f
        .mailboxes
        .query(
            &AgentId::new("orch-1"),
            &MessageQuery {
                message_type: Some(MessageType::Escalation),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].priority, Priority::Critical);
}

#[tokio::test]
async fn timed_out_request_is_reissued() {
    let f = fixture();
    seed_worker(&f, "worker-1", "task-1");
    let worker = AgentId::new("worker-1");

    f.coordinator
        .request_snapshot(&worker, "context critical", None)
        .unwrap();

    // Past the 300s deadline with no snapshot written
    f.clock.advance(Duration::from_secs(301));
    f.coordinator.check_timeouts().await;

    let requests = lifecycle_commands(&f, "worker-1");
    assert_eq!(requests.len(), 2);
    assert_eq!(f.coordinator.flow(&worker).unwrap().retry_count, 1);
}
