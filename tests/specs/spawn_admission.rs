// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: spawn queue with task and domain dependencies.

use cpost_core::{
    AgentId, DomainSpec, FakeClock, SpawnEntryStatus, SpawnRole, SupervisorConfig, Task,
    TaskStatus, Topology,
};
use cpost_engine::SpawnQueue;
use cpost_storage::{AgentRegistry, EventLog, SpawnQueueStore, StateDir, TaskStore};
use tempfile::TempDir;

fn topology() -> Topology {
    let mut topology = Topology::default();
    topology.domains.insert(
        "sales".to_string(),
        DomainSpec {
            po: AgentId::new("po-sales-1"),
        },
    );
    topology.domains.insert(
        "marketing".to_string(),
        DomainSpec {
            po: AgentId::new("po-marketing-1"),
        },
    );
    topology
}

#[test]
fn dependency_wait_resolves_through_release() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    let tasks = TaskStore::new(state.tasks_dir());
    let queue = SpawnQueue::open(
        SpawnQueueStore::new(state.spawn_queue_dir()),
        AgentRegistry::new(state.registry_path()),
        tasks.clone(),
        topology(),
        SupervisorConfig::default(),
        EventLog::new(state.events_path()),
        FakeClock::new(),
    )
    .unwrap();

    // task-A open, marketing at 0/2 tasks done
    tasks
        .save(&Task::builder().id("task-A").domain("sales").status(TaskStatus::InProgress).build())
        .unwrap();
    for id in ["task-m1", "task-m2", "task-m3", "task-m4", "task-m5"] {
        tasks
            .save(&Task::builder().id(id).domain("marketing").status(TaskStatus::InProgress).build())
            .unwrap();
    }

    let id = queue
        .enqueue(
            AgentId::new("po-sales-1"),
            "sales",
            SpawnRole::Worker,
            "needs marketing traction first",
            vec!["task-A".to_string()],
            vec!["marketing".to_string()],
            0.5,
            vec!["crm-sync".to_string()],
        )
        .unwrap();
    assert_eq!(queue.get(&id).unwrap().status, SpawnEntryStatus::DependencyWait);

    // task-A approves; marketing reaches 3/5 = 0.6 ≥ 0.5
    tasks
        .with_task("task-A", |t| {
            t.status = TaskStatus::Approved;
            Ok(())
        })
        .unwrap();
    for id in ["task-m1", "task-m2", "task-m3"] {
        tasks
            .with_task(id, |t| {
                t.status = TaskStatus::Approved;
                Ok(())
            })
            .unwrap();
    }

    let changed = queue.release().unwrap();
    assert_eq!(changed, vec![id.clone()]);
    assert_eq!(queue.get(&id).unwrap().status, SpawnEntryStatus::Queued);

    // Spawn confirmation and deterministic id generation
    queue.mark_spawned(&id, AgentId::new("worker-sales-3")).unwrap();
    assert_eq!(queue.get(&id).unwrap().status, SpawnEntryStatus::Spawned);
    assert_eq!(
        queue.generate_agent_id(SpawnRole::Worker, "sales").unwrap(),
        "worker-sales-4"
    );
}
