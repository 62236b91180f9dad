// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handoff manager: transactional task reassignment.
//!
//! Preconditions are validated before any state changes; the transfer
//! itself is all-or-nothing — a failure partway through rolls every
//! already-moved task back to the source agent. All manager state is
//! mirrored to `handoff-state.json` so a restart resumes from disk.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use cpost_core::{
    AgentId, Clock, Event, EventType, HandoffPhase, HandoffRecord, HandoffState,
    HandoffTransition, Message, MessageId, MessageType, Priority, TaskStatus,
};
use cpost_storage::{
    snapshot_percentage, AgentRegistry, EventLog, HandoffStateStore, MailboxStore, SnapshotStore,
    StorageError, TaskStore,
};
use parking_lot::Mutex;

/// Usage fraction above which an agent may not receive a handoff.
const TARGET_USAGE_CEILING: f64 = 0.80;

/// Outcome of precondition validation.
#[derive(Debug, Clone)]
pub struct HandoffValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub struct HandoffManager<C: Clock> {
    state: Mutex<HandoffState>,
    store: HandoffStateStore,
    tasks: TaskStore,
    snapshots: SnapshotStore,
    mailboxes: MailboxStore,
    registry: AgentRegistry,
    events: EventLog,
    clock: C,
}

impl<C: Clock> HandoffManager<C> {
    /// Open the manager, resuming any persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        store: HandoffStateStore,
        tasks: TaskStore,
        snapshots: SnapshotStore,
        mailboxes: MailboxStore,
        registry: AgentRegistry,
        events: EventLog,
        clock: C,
    ) -> Result<Self, StorageError> {
        let state = store.load()?;
        Ok(Self {
            state: Mutex::new(state),
            store,
            tasks,
            snapshots,
            mailboxes,
            registry,
            events,
            clock,
        })
    }

    pub fn active(&self, source: &AgentId) -> Option<HandoffRecord> {
        self.state
            .lock()
            .active
            .get(source)
            .filter(|r| !r.phase.is_terminal())
            .cloned()
    }

    pub fn has_pending(&self, source: &AgentId) -> bool {
        self.active(source).is_some()
    }

    /// Check every precondition without changing state.
    pub fn validate(
        &self,
        source: &AgentId,
        target: Option<&AgentId>,
        task_ids: &[String],
    ) -> Result<HandoffValidation, EngineError> {
        let mut errors = Vec::new();

        if let Some(target) = target {
            if target == source {
                errors.push("source and target are the same agent".to_string());
            }

            // Circular handoff: the target must not already be handing
            // off to the source.
            let circular = self
                .state
                .lock()
                .active
                .get(target)
                .filter(|r| !r.phase.is_terminal())
                .is_some_and(|r| r.target_agent.as_ref() == Some(source));
            if circular {
                errors.push(format!("circular handoff: {target} is handing off to {source}"));
            }

            match self.snapshots.get_latest(target)? {
                Some(doc) => {
                    if snapshot_percentage(&doc).is_some_and(|p| p >= TARGET_USAGE_CEILING) {
                        errors.push(format!(
                            "target {target} is itself in critical context state"
                        ));
                    }
                }
                None => errors.push(format!("target {target} has no snapshot")),
            }
        }

        if task_ids.is_empty() {
            errors.push("no tasks to transfer".to_string());
        }
        for id in task_ids {
            match self.tasks.get(id) {
                Ok(task) if !task.status.is_transferable() => {
                    errors.push(format!("task {id} is not transferable ({})", task.status));
                }
                Ok(_) => {}
                Err(StorageError::NotFound { .. }) => errors.push(format!("task {id} not found")),
                Err(e) => return Err(e.into()),
            }
        }

        if self.snapshots.get_latest(source)?.is_none() {
            errors.push(format!("source {source} has no snapshot"));
        }

        Ok(HandoffValidation {
            valid: errors.is_empty(),
            errors,
        })
    }

    /// Begin a handoff. On validation failure nothing changes and a
    /// `handoff_failed` event is emitted.
    pub fn initiate(
        &self,
        source: &AgentId,
        reason: impl Into<String>,
        target: Option<AgentId>,
        task_ids: Vec<String>,
    ) -> Result<(), EngineError> {
        if self.has_pending(source) {
            return Err(EngineError::Consistency(format!(
                "{source} already has a pending handoff"
            )));
        }

        let validation = self.validate(source, target.as_ref(), &task_ids)?;
        if !validation.valid {
            self.log_event(EventType::HandoffFailed, source, |e| {
                e.with_field("errors", validation.errors.join("; "))
            });
            return Err(EngineError::Validation(validation.errors.join("; ")));
        }

        let now = self.clock.now_utc();
        let record = HandoffRecord {
            source_agent: source.clone(),
            target_agent: target,
            tasks_to_transfer: task_ids,
            phase: HandoffPhase::Initiated,
            reason: reason.into(),
            initiated_at: now,
            completed_at: None,
        };

        {
            let mut state = self.state.lock();
            state.active.insert(source.clone(), record.clone());
            push_history(&mut state, &record, now, None);
            self.store.save(&state)?;
        }
        self.log_event(EventType::HandoffInitiated, source, |e| e);
        Ok(())
    }

    /// Transfer the tasks to the target atomically and finish the
    /// handoff. Partial failure rolls back every already-updated task.
    pub fn complete(
        &self,
        source: &AgentId,
        target: &AgentId,
        task_ids: &[String],
    ) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            let record = state.active.get_mut(source).ok_or_else(|| {
                EngineError::NotFound(format!("no active handoff for {source}"))
            })?;
            if record.phase.is_terminal() {
                return Err(EngineError::Consistency(format!(
                    "handoff for {source} is already {}",
                    record.phase
                )));
            }
            record.phase = HandoffPhase::InProgress;
            record.target_agent = Some(target.clone());
            self.store.save(&state)?;
        }

        let now = self.clock.now_utc();
        let mut transferred: Vec<String> = Vec::new();
        for id in task_ids {
            let result = self.tasks.with_task(id, |task| {
                task.assigned_to = Some(target.clone());
                task.status = TaskStatus::InProgress;
                task.context.handoff_count += 1;
                task.context
                    .decision_log
                    .push(format!("Handoff from {source} at {}", now.to_rfc3339()));
                task.timestamps.updated_at = now;
                Ok(())
            });
            match result {
                Ok(()) => transferred.push(id.clone()),
                Err(e) => {
                    self.rollback(source, &transferred, now);
                    self.finish(source, HandoffPhase::Failed, now, Some(e.to_string()))?;
                    self.log_event(EventType::HandoffFailed, source, |ev| {
                        ev.with_field("failed_task", id.as_str())
                            .with_field("rolled_back", transferred.len() as u64)
                    });
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = self.registry.increment_handoff(source) {
            tracing::warn!(agent_id = %source, error = %e, "handoff count not recorded");
        }

        // Hand the target the source's final snapshot
        let snapshot = self.snapshots.get_latest(source)?;
        let mut message = Message::new(source.as_str(), target.as_str(), MessageType::MemoryHandoff)
            .with_priority(Priority::High)
            .with_field("event", "tasks_transferred")
            .with_field("task_ids", serde_json::json!(task_ids));
        if let Some(snapshot) = snapshot {
            message = message.with_field("snapshot", snapshot);
        }
        message.id = MessageId::generate();
        message.timestamp = now;
        self.mailboxes.append(target, message)?;

        self.finish(source, HandoffPhase::Completed, now, None)?;
        self.log_event(EventType::HandoffCompleted, source, |e| {
            e.with_field("target", target.as_str())
                .with_field("tasks", task_ids.len() as u64)
        });
        Ok(())
    }

    /// Cancel a handoff that has not begun transferring.
    pub fn cancel(&self, source: &AgentId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let record = state
            .active
            .get_mut(source)
            .ok_or_else(|| EngineError::NotFound(format!("no active handoff for {source}")))?;
        if record.phase != HandoffPhase::Initiated {
            return Err(EngineError::Consistency(format!(
                "cannot cancel handoff in phase {}",
                record.phase
            )));
        }
        record.phase = HandoffPhase::Cancelled;
        let record = record.clone();
        push_history(&mut state, &record, self.clock.now_utc(), None);
        self.store.save(&state)?;
        Ok(())
    }

    /// Phase transitions involving an agent, optionally time-bounded.
    pub fn query_history(
        &self,
        agent: &AgentId,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Vec<HandoffTransition> {
        self.state
            .lock()
            .history
            .iter()
            .filter(|t| &t.source_agent == agent || t.target_agent.as_ref() == Some(agent))
            .filter(|t| since.map_or(true, |s| t.timestamp >= s))
            .filter(|t| until.map_or(true, |u| t.timestamp <= u))
            .cloned()
            .collect()
    }

    fn rollback(&self, source: &AgentId, transferred: &[String], now: DateTime<Utc>) {
        for id in transferred {
            let result = self.tasks.with_task(id, |task| {
                task.assigned_to = Some(source.clone());
                task.status = TaskStatus::InProgress;
                task.context
                    .decision_log
                    .push(format!("Rolled back handoff, returned to {source}"));
                task.timestamps.updated_at = now;
                Ok(())
            });
            if let Err(e) = result {
                tracing::error!(task_id = %id, error = %e, "handoff rollback failed");
            }
        }
    }

    fn finish(
        &self,
        source: &AgentId,
        phase: HandoffPhase,
        now: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if let Some(record) = state.active.get_mut(source) {
            record.phase = phase;
            if phase == HandoffPhase::Completed {
                record.completed_at = Some(now);
            }
            let record = record.clone();
            push_history(&mut state, &record, now, note);
        }
        self.store.save(&state)
    }

    fn log_event(
        &self,
        event_type: EventType,
        agent: &AgentId,
        build: impl FnOnce(Event) -> Event,
    ) {
        let event = build(Event::new(event_type, self.clock.now_utc()).for_agent(agent.clone()));
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log handoff event");
        }
    }
}

fn push_history(
    state: &mut HandoffState,
    record: &HandoffRecord,
    now: DateTime<Utc>,
    note: Option<String>,
) {
    state.history.push(HandoffTransition {
        timestamp: now,
        source_agent: record.source_agent.clone(),
        target_agent: record.target_agent.clone(),
        phase: record.phase,
        note,
    });
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
