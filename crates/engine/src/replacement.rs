// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replacement coordinator: the Memory Snapshot Protocol.
//!
//! One flow per doomed agent, advanced by polling what collaborators
//! wrote to disk:
//!
//! ```text
//! idle → snapshot_requested → snapshot_received → snapshot_validated
//!      → replacement_prepared → replacement_spawned → original_shutdown
//!      → completed (or failed at any step)
//! ```
//!
//! Low-quality snapshots are retried with a message enumerating the
//! failed checks; after `max_snapshot_retries` the flow force-handoffs
//! with whatever snapshot exists.

use crate::error::EngineError;
use crate::handoff::HandoffManager;
use crate::quality::validate_prd;
use crate::spawner::ReplacementSpawner;
use cpost_adapters::SpawnExecutor;
use cpost_core::{
    AgentId, AgentStatus, Clock, ContextUsage, Event, EventType, FlowId, FlowPhase, Message,
    MessageId, MessageType, PrdSnapshot, Priority, RegistryEntry, ReplacementFlow,
    SupervisorConfig, Task,
};
use cpost_storage::{
    write_json_atomic, AgentRegistry, EventLog, MailboxStore, SnapshotStore, SpawnRequestStore,
    StateDir, TaskStore,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Sender id stamped on protocol messages.
const MONITOR_SENDER: &str = "context-monitor";

pub struct ReplacementCoordinator<C: Clock> {
    flows: Mutex<HashMap<AgentId, ReplacementFlow>>,
    completed: Mutex<Vec<ReplacementFlow>>,
    config: SupervisorConfig,
    state_dir: StateDir,
    mailboxes: MailboxStore,
    snapshots: SnapshotStore,
    tasks: TaskStore,
    registry: AgentRegistry,
    requests: SpawnRequestStore,
    events: EventLog,
    handoff: Arc<HandoffManager<C>>,
    spawner: ReplacementSpawner<C>,
    executor: Option<Arc<dyn SpawnExecutor>>,
    orchestrator: AgentId,
    clock: C,
}

impl<C: Clock> ReplacementCoordinator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SupervisorConfig,
        state_dir: StateDir,
        mailboxes: MailboxStore,
        snapshots: SnapshotStore,
        tasks: TaskStore,
        registry: AgentRegistry,
        requests: SpawnRequestStore,
        events: EventLog,
        handoff: Arc<HandoffManager<C>>,
        spawner: ReplacementSpawner<C>,
        executor: Option<Arc<dyn SpawnExecutor>>,
        orchestrator: AgentId,
        clock: C,
    ) -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
            config,
            state_dir,
            mailboxes,
            snapshots,
            tasks,
            registry,
            requests,
            events,
            handoff,
            spawner,
            executor,
            orchestrator,
            clock,
        }
    }

    /// Guard: only one flow per agent at a time.
    pub fn is_replacement_active(&self, agent: &AgentId) -> bool {
        self.flows.lock().contains_key(agent)
    }

    pub fn flow(&self, agent: &AgentId) -> Option<ReplacementFlow> {
        self.flows.lock().get(agent).cloned()
    }

    pub fn completed_flows(&self) -> Vec<ReplacementFlow> {
        self.completed.lock().clone()
    }

    /// Step 1 — ask the agent for a memory snapshot and open a flow.
    pub fn request_snapshot(
        &self,
        agent: &AgentId,
        reason: impl Into<String>,
        usage: Option<ContextUsage>,
    ) -> Result<FlowId, EngineError> {
        if self.is_replacement_active(agent) {
            return Err(EngineError::Consistency(format!(
                "replacement already active for {agent}"
            )));
        }
        let entry = self
            .registry
            .get(agent)?
            .ok_or_else(|| EngineError::NotFound(format!("agent {agent} not registered")))?;
        let task_ids = self.assigned_task_ids(agent)?;

        let reason = reason.into();
        let now = self.clock.now_utc();
        let mut flow = ReplacementFlow::new(
            agent.clone(),
            reason.clone(),
            entry.role,
            entry.domain.clone(),
            task_ids,
            now,
        );
        flow.context_usage = usage;
        flow.phase = FlowPhase::SnapshotRequested;
        let flow_id = flow.flow_id.clone();

        self.send_snapshot_request(agent, &flow, &reason, usage, None)?;
        self.notify_orchestrator(
            MessageType::LifecycleCommand,
            Priority::High,
            format!("requested memory snapshot from {agent}: {reason}"),
            |m| m.with_field("flow_id", flow_id.as_str()),
        )?;

        self.flows.lock().insert(agent.clone(), flow);
        tracing::info!(agent_id = %agent, flow_id = %flow_id, "snapshot requested");
        Ok(flow_id)
    }

    /// Steps 2–4 — read, validate, and act on the agent's snapshot.
    pub async fn process_snapshot(&self, agent: &AgentId) -> Result<(), EngineError> {
        let Some(mut flow) = self.flow(agent) else {
            return Err(EngineError::NotFound(format!("no flow for {agent}")));
        };
        if flow.phase != FlowPhase::SnapshotRequested {
            return Err(EngineError::Consistency(format!(
                "flow for {agent} is in phase {}",
                flow.phase
            )));
        }

        let Some(doc) = self.snapshots.get_latest(agent)? else {
            self.fail_flow(agent, "agent produced no snapshot");
            return Err(EngineError::NotFound(format!("no snapshot for {agent}")));
        };
        flow.phase = FlowPhase::SnapshotReceived;

        let snapshot: PrdSnapshot = match serde_json::from_value(doc) {
            Ok(snapshot) => snapshot,
            Err(_) => PrdSnapshot::skeletal(agent.clone(), 0),
        };
        let task = self.first_task(&flow)?;
        let report = validate_prd(&snapshot, task.as_ref());
        flow.quality_score = Some(report.score);
        flow.best_quality_score = flow.best_quality_score.max(report.score);

        if report.score >= self.config.min_quality_score {
            flow.phase = FlowPhase::SnapshotValidated;
            self.store_flow(flow.clone());
            self.finalize(flow, snapshot, false).await
        } else {
            flow.retry_count += 1;
            if flow.retry_count >= self.config.max_snapshot_retries {
                tracing::warn!(
                    agent_id = %agent,
                    retries = flow.retry_count,
                    best_score = flow.best_quality_score,
                    "snapshot retries exhausted, forcing handoff"
                );
                self.store_flow(flow.clone());
                self.finalize(flow, snapshot, true).await
            } else {
                let failed = report.failed_checks().join(", ");
                let reason = flow.reason.clone();
                let usage = flow.context_usage;
                self.send_snapshot_request(agent, &flow, &reason, usage, Some(&failed))?;
                flow.phase = FlowPhase::SnapshotRequested;
                flow.snapshot_requested_at = self.clock.now_utc();
                self.store_flow(flow);
                Ok(())
            }
        }
    }

    /// Advance every open flow from what is on disk: process snapshots
    /// that arrived, re-issue or force past requests that timed out.
    pub async fn poll(&self) {
        let waiting: Vec<(AgentId, DateTime<Utc>)> = self
            .flows
            .lock()
            .values()
            .filter(|f| f.phase == FlowPhase::SnapshotRequested)
            .map(|f| (f.agent_id.clone(), f.snapshot_requested_at))
            .collect();

        for (agent, requested_at) in waiting {
            match self.snapshot_arrived_after(&agent, requested_at) {
                Ok(true) => {
                    if let Err(e) = self.process_snapshot(&agent).await {
                        tracing::warn!(agent_id = %agent, error = %e, "snapshot processing failed");
                    }
                }
                Ok(false) => self.check_timeout(&agent, requested_at).await,
                Err(e) => tracing::warn!(agent_id = %agent, error = %e, "snapshot poll failed"),
            }
        }
    }

    /// Re-issue timed-out snapshot requests; force-handoff once retries
    /// are exhausted.
    pub async fn check_timeouts(&self) {
        let waiting: Vec<(AgentId, DateTime<Utc>)> = self
            .flows
            .lock()
            .values()
            .filter(|f| f.phase == FlowPhase::SnapshotRequested)
            .map(|f| (f.agent_id.clone(), f.snapshot_requested_at))
            .collect();
        for (agent, requested_at) in waiting {
            self.check_timeout(&agent, requested_at).await;
        }
    }

    async fn check_timeout(&self, agent: &AgentId, requested_at: DateTime<Utc>) {
        let deadline_ms = self.config.snapshot_timeout_ms as i64;
        let age_ms = (self.clock.now_utc() - requested_at).num_milliseconds();
        if age_ms <= deadline_ms {
            return;
        }

        let Some(mut flow) = self.flow(agent) else {
            return;
        };
        flow.retry_count += 1;
        if flow.retry_count >= self.config.max_snapshot_retries {
            let snapshot = self
                .latest_prd(agent)
                .unwrap_or_else(|| PrdSnapshot::skeletal(agent.clone(), 0));
            tracing::warn!(agent_id = %agent, "snapshot deadline passed, forcing handoff");
            self.store_flow(flow.clone());
            if let Err(e) = self.finalize(flow, snapshot, true).await {
                tracing::warn!(agent_id = %agent, error = %e, "forced handoff failed");
            }
        } else {
            let reason = flow.reason.clone();
            let usage = flow.context_usage;
            if let Err(e) =
                self.send_snapshot_request(agent, &flow, &reason, usage, Some("request timed out"))
            {
                tracing::warn!(agent_id = %agent, error = %e, "snapshot re-issue failed");
                return;
            }
            flow.snapshot_requested_at = self.clock.now_utc();
            self.store_flow(flow);
        }
    }

    /// Step 4 — prepare the replacement, transfer tasks, spawn, and shut
    /// the original down. Any error fails the flow and escalates.
    async fn finalize(
        &self,
        mut flow: ReplacementFlow,
        snapshot: PrdSnapshot,
        forced: bool,
    ) -> Result<(), EngineError> {
        let agent = flow.agent_id.clone();

        // Force-handoff may proceed with nothing usable on disk; the
        // handoff validator still needs a source snapshot to exist.
        if forced && self.snapshots.get_latest(&agent)?.is_none() {
            self.snapshots
                .create(&agent, &snapshot, self.clock.now_utc())?;
        }

        if let Err(e) = self.handoff.initiate(
            &agent,
            flow.reason.clone(),
            None,
            flow.task_ids.clone(),
        ) {
            self.fail_flow(&agent, &format!("handoff initiation failed: {e}"));
            return Err(e);
        }

        let handoff_number = self
            .registry
            .get(&agent)?
            .map(|e| e.handoff_count + 1)
            .unwrap_or(1);
        let replacement = ReplacementSpawner::<C>::replacement_id(&agent, handoff_number);

        let request = match self.spawner.prepare(
            &agent,
            &replacement,
            &snapshot,
            handoff_number,
            &flow.role.to_string(),
            &flow.domain,
            flow.task_ids.clone(),
        ) {
            Ok(request) => request,
            Err(e) => {
                self.fail_flow(&agent, &format!("replacement preparation failed: {e}"));
                return Err(e);
            }
        };
        flow.phase = FlowPhase::ReplacementPrepared;
        flow.replacement_agent_id = Some(replacement.clone());
        self.store_flow(flow.clone());

        if let Err(e) = self
            .handoff
            .complete(&agent, &replacement, &flow.task_ids.clone())
        {
            self.fail_flow(&agent, &format!("task transfer failed: {e}"));
            return Err(e);
        }

        if let Some(executor) = &self.executor {
            if let Err(e) = executor.execute(&request).await {
                self.fail_flow(&agent, &format!("spawn failed: {e}"));
                return Err(e.into());
            }
            // Launcher contract: the request file is consumed on success
            if let Err(e) = self.requests.consume(&request.request_id) {
                tracing::warn!(error = %e, "spawn request not consumed");
            }
        }
        self.registry.upsert(
            replacement.clone(),
            RegistryEntry {
                tmux_session: cpost_adapters::launcher::session_name(replacement.as_str()),
                role: flow.role,
                domain: flow.domain.clone(),
                task_id: flow.task_ids.first().cloned(),
                transcript_path: None,
                pid: None,
                status: AgentStatus::Active,
                launched_at: self.clock.now_utc(),
                handoff_count: 0,
            },
        )?;
        flow.phase = FlowPhase::ReplacementSpawned;
        self.store_flow(flow.clone());

        self.send_system(&agent, MessageType::LifecycleCommand, Priority::Critical, |m| {
            m.with_field("command", "prepare_shutdown")
                .with_field("replacement_agent_id", replacement.as_str())
        })?;
        self.notify_orchestrator(
            MessageType::TaskUpdate,
            Priority::High,
            format!("{agent} replaced by {replacement}"),
            |m| {
                m.with_field("forced", forced)
                    .with_field("replacement_agent_id", replacement.as_str())
                    .with_field("original_agent_id", agent.as_str())
            },
        )?;
        flow.phase = FlowPhase::OriginalShutdown;
        self.store_flow(flow.clone());

        flow.phase = FlowPhase::Completed;
        self.archive(flow);
        tracing::info!(agent_id = %agent, replacement = %replacement, forced, "replacement complete");
        Ok(())
    }

    fn fail_flow(&self, agent: &AgentId, error: &str) {
        let Some(mut flow) = self.flows.lock().remove(agent) else {
            return;
        };
        flow.phase = FlowPhase::Failed;
        flow.error = Some(error.to_string());

        let event = Event::new(EventType::HandoffFailed, self.clock.now_utc())
            .for_agent(agent.clone())
            .with_field("flow_id", flow.flow_id.as_str())
            .with_field("error", error);
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log flow failure");
        }

        let escalation = self.notify_orchestrator(
            MessageType::Escalation,
            Priority::Critical,
            format!("replacement flow for {agent} failed: {error}"),
            |m| m.with_field("flow_id", flow.flow_id.as_str()),
        );
        if let Err(e) = escalation {
            tracing::error!(error = %e, "failed to escalate flow failure");
        }

        self.archive_record(flow);
        tracing::warn!(agent_id = %agent, error, "replacement flow failed");
    }

    /// Archive a flow that is leaving the active set.
    fn archive(&self, flow: ReplacementFlow) {
        self.flows.lock().remove(&flow.agent_id);
        self.archive_record(flow);
    }

    fn archive_record(&self, flow: ReplacementFlow) {
        let path = self
            .state_dir
            .completed_flows_dir()
            .join(format!("{}.json", flow.flow_id));
        if let Err(e) = write_json_atomic(&path, &flow) {
            tracing::warn!(error = %e, "failed to archive flow");
        }
        self.completed.lock().push(flow);
    }

    fn store_flow(&self, flow: ReplacementFlow) {
        self.flows.lock().insert(flow.agent_id.clone(), flow);
    }

    fn assigned_task_ids(&self, agent: &AgentId) -> Result<Vec<String>, EngineError> {
        Ok(self
            .tasks
            .list()?
            .into_iter()
            .filter(|t| t.assigned_to.as_ref() == Some(agent) && t.status.is_transferable())
            .map(|t| t.id)
            .collect())
    }

    fn first_task(&self, flow: &ReplacementFlow) -> Result<Option<Task>, EngineError> {
        match flow.task_ids.first() {
            Some(id) => Ok(self.tasks.get(id).ok()),
            None => Ok(None),
        }
    }

    fn latest_prd(&self, agent: &AgentId) -> Option<PrdSnapshot> {
        self.snapshots
            .get_latest(agent)
            .ok()
            .flatten()
            .and_then(|doc| serde_json::from_value(doc).ok())
    }

    fn snapshot_arrived_after(
        &self,
        agent: &AgentId,
        requested_at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let Some(doc) = self.snapshots.get_latest(agent)? else {
            return Ok(false);
        };
        let arrived = doc
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));
        // Strictly newer: a snapshot already judged this round must not
        // be re-judged on the next poll.
        Ok(arrived.is_some_and(|t| t > requested_at))
    }

    fn send_snapshot_request(
        &self,
        agent: &AgentId,
        flow: &ReplacementFlow,
        reason: &str,
        usage: Option<ContextUsage>,
        failed_checks: Option<&str>,
    ) -> Result<(), EngineError> {
        self.send_system(agent, MessageType::LifecycleCommand, Priority::Critical, |mut m| {
            m = m
                .with_field("command", "write_memory_snapshot")
                .with_field("reason", reason)
                .with_field("deadline", "complete_current_atomic_operation")
                .with_field("flow_id", flow.flow_id.as_str());
            if let Some(usage) = usage {
                m = m.with_field(
                    "current_usage",
                    serde_json::to_value(usage).unwrap_or_default(),
                );
            }
            if let Some(failed) = failed_checks {
                m = m.with_field("failed_checks", failed);
            }
            m
        })
    }

    fn send_system(
        &self,
        to: &AgentId,
        message_type: MessageType,
        priority: Priority,
        build: impl FnOnce(Message) -> Message,
    ) -> Result<(), EngineError> {
        let mut message = build(
            Message::new(MONITOR_SENDER, to.as_str(), message_type).with_priority(priority),
        );
        message.id = MessageId::generate();
        message.timestamp = self.clock.now_utc();
        self.mailboxes.append(to, message)?;
        Ok(())
    }

    fn notify_orchestrator(
        &self,
        message_type: MessageType,
        priority: Priority,
        text: String,
        build: impl FnOnce(Message) -> Message,
    ) -> Result<(), EngineError> {
        let to = self.orchestrator.clone();
        self.send_system(&to, message_type, priority, |m| {
            build(m.with_field("message", text.as_str()))
        })
    }
}

#[cfg(test)]
#[path = "replacement_tests.rs"]
mod tests;
