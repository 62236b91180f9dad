// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wiring for scenario specs: a full supervision stack over a
//! temp project root, with fake sessions and a fake clock.

use cpost_adapters::{FakeSessionAdapter, FakeSpawnExecutor, SpawnExecutor};
use cpost_core::{
    AgentId, Clock, FakeClock, Message, MessageId, MessageType, RegistryEntry, Role,
    SupervisorConfig, Task, TaskStatus,
};
use cpost_engine::{
    ContextMonitor, FindingsRegistry, HandoffManager, ReplacementCoordinator, ReplacementSpawner,
    TaskCompletionMonitor,
};
use cpost_storage::{
    AgentRegistry, EventLog, HandoffStateStore, MailboxStore, SnapshotStore, SpawnRequestStore,
    StateDir, StatusCache, TaskStore,
};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Harness {
    pub dir: TempDir,
    pub state: StateDir,
    pub clock: FakeClock,
    pub sessions: Arc<FakeSessionAdapter>,
    pub executor: Arc<FakeSpawnExecutor>,
    pub mailboxes: MailboxStore,
    pub events: EventLog,
    pub snapshots: SnapshotStore,
    pub tasks: TaskStore,
    pub registry: AgentRegistry,
    pub findings: Arc<FindingsRegistry<FakeClock>>,
    pub coordinator: Arc<ReplacementCoordinator<FakeClock>>,
    pub context_monitor: ContextMonitor<FakeSessionAdapter, FakeClock>,
    pub completion_monitor: Arc<TaskCompletionMonitor<FakeClock>>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let state = StateDir::new(dir.path());
        let clock = FakeClock::new();
        let config = SupervisorConfig::default();
        let sessions = Arc::new(FakeSessionAdapter::new());
        let executor = Arc::new(FakeSpawnExecutor::new());

        let mailboxes = MailboxStore::new(state.messages_dir());
        let events = EventLog::new(state.events_path());
        let snapshots = SnapshotStore::new(state.snapshots_dir());
        let tasks = TaskStore::new(state.tasks_dir());
        let registry = AgentRegistry::new(state.registry_path());
        let requests = SpawnRequestStore::new(state.spawn_requests_dir());

        let findings = Arc::new(
            FindingsRegistry::open(state.findings_path(), events.clone(), clock.clone()).unwrap(),
        );
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
        let coordinator = Arc::new(ReplacementCoordinator::new(
            config.clone(),
            state.clone(),
            mailboxes.clone(),
            snapshots.clone(),
            tasks.clone(),
            registry.clone(),
            requests,
            events.clone(),
            handoff,
            spawner,
            Some(Arc::clone(&executor) as Arc<dyn SpawnExecutor>),
            AgentId::new("orch-1"),
            clock.clone(),
        ));
        let context_monitor = ContextMonitor::new(
            registry.clone(),
            snapshots.clone(),
            events.clone(),
            Arc::clone(&sessions),
            Arc::clone(&coordinator),
            config.clone(),
            clock.clone(),
        );
        let completion_monitor = Arc::new(
            TaskCompletionMonitor::open(
                tasks.clone(),
                registry.clone(),
                mailboxes.clone(),
                events.clone(),
                Arc::clone(&findings),
                StatusCache::new(state.status_cache_path()),
                state.cascade_state_path(),
                config,
                clock.clone(),
            )
            .unwrap(),
        );

        let weak = Arc::downgrade(&completion_monitor);
        findings.on_resolved(move |finding| {
            if let Some(monitor) = weak.upgrade() {
                monitor.on_finding_resolved(finding);
            }
        });

        Self {
            dir,
            state,
            clock,
            sessions,
            executor,
            mailboxes,
            events,
            snapshots,
            tasks,
            registry,
            findings,
            coordinator,
            context_monitor,
            completion_monitor,
        }
    }

    pub fn register(&self, id: &str, role: Role, domain: &str) {
        let session = format!("cp-{id}");
        self.sessions.add_session(&session, true);
        self.registry
            .upsert(
                AgentId::new(id),
                RegistryEntry::builder()
                    .tmux_session(session)
                    .role(role)
                    .domain(domain)
                    .build(),
            )
            .unwrap();
    }

    pub fn create_task(&self, id: &str, domain: &str, owner: &str) {
        let mut task = Task::builder()
            .id(id)
            .title(id)
            .feature(id)
            .domain(domain)
            .status(TaskStatus::Pending)
            .build();
        task.assigned_to = Some(AgentId::new(owner));
        self.tasks.save(&task).unwrap();
    }

    /// Walk a task through the kanban to the given status.
    pub fn advance_task(&self, id: &str, to: TaskStatus) {
        let path = [
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            TaskStatus::ReadyForReview,
        ];
        for step in path {
            if self.tasks.get(id).unwrap().status == to {
                return;
            }
            self.tasks
                .transition(id, step, self.clock.now_utc())
                .unwrap();
            if step == to {
                return;
            }
        }
    }

    /// An audit agent files a compliance report to the orchestrator.
    pub fn file_audit_report(&self, auditor: &str, task_id: &str, compliance: f64) {
        let mut msg = Message::new(auditor, "orch-1", MessageType::AuditReport)
            .with_field("task_id", task_id)
            .with_field("compliance_score", compliance);
        msg.id = MessageId::generate();
        msg.timestamp = self.clock.now_utc();
        self.mailboxes.append(&AgentId::new("orch-1"), msg).unwrap();
    }

    pub fn shutdown_count(&self, agent: &str) -> usize {
        self.mailboxes
            .read(&AgentId::new(agent))
            .unwrap()
            .iter()
            .filter(|m| {
                m.message_type == MessageType::LifecycleCommand
                    && m.body_str("command") == Some("prepare_shutdown")
            })
            .count()
    }
}
