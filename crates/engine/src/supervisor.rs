// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor assembly.
//!
//! Wires the stores, adapters, and state machines together and drives
//! the two periodic pollers as tokio tasks. `stop()` is idempotent and
//! does not cancel in-flight cycles — they complete, then no further
//! cycles begin.

use crate::closeout::CloseoutManager;
use crate::completion::TaskCompletionMonitor;
use crate::error::EngineError;
use crate::findings::FindingsRegistry;
use crate::handoff::HandoffManager;
use crate::monitor::ContextMonitor;
use crate::replacement::ReplacementCoordinator;
use crate::spawn_queue::SpawnQueue;
use crate::spawner::ReplacementSpawner;
use cpost_adapters::{SessionAdapter, SessionLauncher, SpawnExecutor};
use cpost_core::{AgentId, Clock, ConfigFile, SupervisorConfig};
use cpost_storage::{
    AgentRegistry, EventLog, HandoffStateStore, MailboxStore, SnapshotStore, SpawnQueueStore,
    SpawnRequestStore, StateDir, StatusCache, TaskStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default command the launcher starts inside a new agent session.
const DEFAULT_AGENT_COMMAND: &str = "claude";

pub struct Supervisor<S: SessionAdapter, C: Clock> {
    pub context_monitor: Arc<ContextMonitor<S, C>>,
    pub completion_monitor: Arc<TaskCompletionMonitor<C>>,
    pub coordinator: Arc<ReplacementCoordinator<C>>,
    pub findings: Arc<FindingsRegistry<C>>,
    pub handoff: Arc<HandoffManager<C>>,
    pub spawn_queue: Arc<SpawnQueue<C>>,
    pub closeout: Arc<CloseoutManager<C>>,
    config: SupervisorConfig,
    stop_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: SessionAdapter, C: Clock> Supervisor<S, C> {
    /// Build the full supervision stack over one project root.
    pub fn build(
        state: StateDir,
        config_file: ConfigFile,
        sessions: Arc<S>,
        clock: C,
    ) -> Result<Arc<Self>, EngineError> {
        let config = config_file.supervisor.clone();
        let mailboxes = MailboxStore::new(state.messages_dir());
        let events = EventLog::new(state.events_path());
        let snapshots = SnapshotStore::new(state.snapshots_dir());
        let tasks = TaskStore::new(state.tasks_dir());
        let registry = AgentRegistry::new(state.registry_path());
        let requests = SpawnRequestStore::new(state.spawn_requests_dir());

        let orchestrator = registry
            .load()?
            .iter()
            .find(|(_, e)| e.role == cpost_core::Role::Orchestrator)
            .map(|(id, _)| id.clone())
            .unwrap_or_else(|| AgentId::new("orchestrator"));

        let findings = Arc::new(FindingsRegistry::open(
            state.findings_path(),
            events.clone(),
            clock.clone(),
        )?);
        let handoff = Arc::new(HandoffManager::open(
            HandoffStateStore::new(state.handoff_state_path()),
            tasks.clone(),
            snapshots.clone(),
            mailboxes.clone(),
            registry.clone(),
            events.clone(),
            clock.clone(),
        )?);
        let spawner = ReplacementSpawner::new(
            state.clone(),
            mailboxes.clone(),
            requests.clone(),
            events.clone(),
            clock.clone(),
        );
        let launcher: Arc<dyn SpawnExecutor> = Arc::new(SessionLauncher::new(
            Arc::clone(&sessions),
            DEFAULT_AGENT_COMMAND,
            state
                .project_root()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ));
        let coordinator = Arc::new(ReplacementCoordinator::new(
            config.clone(),
            state.clone(),
            mailboxes.clone(),
            snapshots.clone(),
            tasks.clone(),
            registry.clone(),
            requests,
            events.clone(),
            Arc::clone(&handoff),
            spawner,
            Some(launcher),
            orchestrator,
            clock.clone(),
        ));
        let context_monitor = Arc::new(ContextMonitor::new(
            registry.clone(),
            snapshots.clone(),
            events.clone(),
            sessions,
            Arc::clone(&coordinator),
            config.clone(),
            clock.clone(),
        ));
        let completion_monitor = Arc::new(TaskCompletionMonitor::open(
            tasks.clone(),
            registry.clone(),
            mailboxes.clone(),
            events.clone(),
            Arc::clone(&findings),
            StatusCache::new(state.status_cache_path()),
            state.cascade_state_path(),
            config.clone(),
            clock.clone(),
        )?);
        let spawn_queue = Arc::new(SpawnQueue::open(
            SpawnQueueStore::new(state.spawn_queue_dir()),
            registry,
            tasks,
            config_file.topology,
            config.clone(),
            events.clone(),
            clock.clone(),
        )?);
        let closeout = Arc::new(CloseoutManager::new(
            state,
            mailboxes,
            events,
            config.clone(),
            clock,
        ));

        let (stop_tx, _) = watch::channel(false);
        let supervisor = Arc::new(Self {
            context_monitor,
            completion_monitor,
            coordinator,
            findings,
            handoff,
            spawn_queue,
            closeout,
            config,
            stop_tx,
            handles: Mutex::new(Vec::new()),
        });

        // Findings resolution releases agents held by the cascade
        let weak = Arc::downgrade(&supervisor.completion_monitor);
        supervisor.findings.on_resolved(move |finding| {
            if let Some(monitor) = weak.upgrade() {
                monitor.on_finding_resolved(finding);
            }
        });

        // Closeout runs between tiers 5 and 6, then calls back
        let closeout = Arc::clone(&supervisor.closeout);
        let completion = Arc::clone(&supervisor.completion_monitor);
        supervisor.completion_monitor.set_closeout_trigger(move || {
            let closeout = Arc::clone(&closeout);
            let completion = Arc::clone(&completion);
            tokio::spawn(async move {
                let result = closeout.run().await;
                if !result.success {
                    tracing::warn!(errors = ?result.errors, "closeout finished with errors");
                }
                if let Err(e) = completion.complete_closeout_and_shutdown() {
                    tracing::error!(error = %e, "final shutdown failed");
                }
            });
        });

        Ok(supervisor)
    }

    /// Start the periodic pollers.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }

        let context = Arc::clone(&self.context_monitor);
        let mut stop = self.stop_tx.subscribe();
        let interval_ms = self.config.poll_interval_ms;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = context.poll_once().await {
                            tracing::warn!(error = %e, "context monitor cycle failed");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
        }));

        let completion = Arc::clone(&self.completion_monitor);
        let mut stop = self.stop_tx.subscribe();
        let interval_ms = self.config.task_completion_poll_interval_ms;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = completion.poll_once() {
                            tracing::warn!(error = %e, "task monitor cycle failed");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
        }));
    }

    /// Signal the pollers to finish their current cycle and stop.
    /// Safe to call any number of times.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
