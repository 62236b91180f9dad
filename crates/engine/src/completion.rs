// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task completion monitor and the tiered shutdown cascade.
//!
//! Each poll: index the roster, diff the kanban against the durable
//! last-seen status map, run the transition handlers, then evaluate the
//! cascade predicates tier by tier. Every `prepare_shutdown` is sent at
//! most once per agent — the sent-set is persisted so a restarted
//! monitor does not repeat itself.

use crate::cascade::{self, CascadeState};
use crate::error::EngineError;
use crate::findings::FindingsRegistry;
use crate::topology::TopologyIndex;
use cpost_core::{
    AgentId, AgentStatus, Clock, Event, EventType, Finding, Message, MessageId, MessageType,
    Priority, SupervisorConfig, Task, TaskStatus,
};
use cpost_storage::{
    write_json_atomic, AgentRegistry, EventLog, MailboxStore, MessageQuery, StatusCache, TaskStore,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fallback sender when no orchestrator is registered.
const MONITOR_SENDER: &str = "task-monitor";

type CloseoutTrigger = Box<dyn Fn() + Send + Sync>;

pub struct TaskCompletionMonitor<C: Clock> {
    tasks: TaskStore,
    registry: AgentRegistry,
    mailboxes: MailboxStore,
    events: EventLog,
    findings: Arc<FindingsRegistry<C>>,
    status_cache: StatusCache,
    cascade_path: PathBuf,
    cascade: Mutex<CascadeState>,
    config: SupervisorConfig,
    closeout_trigger: Mutex<Option<CloseoutTrigger>>,
    closeout_invoked: AtomicBool,
    project_completed: AtomicBool,
    clock: C,
}

impl<C: Clock> TaskCompletionMonitor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        tasks: TaskStore,
        registry: AgentRegistry,
        mailboxes: MailboxStore,
        events: EventLog,
        findings: Arc<FindingsRegistry<C>>,
        status_cache: StatusCache,
        cascade_path: PathBuf,
        config: SupervisorConfig,
        clock: C,
    ) -> Result<Self, EngineError> {
        let cascade = cpost_storage::read_json_opt(&cascade_path)?.unwrap_or_default();
        Ok(Self {
            tasks,
            registry,
            mailboxes,
            events,
            findings,
            status_cache,
            cascade_path,
            cascade: Mutex::new(cascade),
            config,
            closeout_trigger: Mutex::new(None),
            closeout_invoked: AtomicBool::new(false),
            project_completed: AtomicBool::new(false),
            clock,
        })
    }

    /// Install the closeout hook invoked at the tier-5→6 boundary
    /// instead of shutting the orchestrator down directly.
    pub fn set_closeout_trigger(&self, trigger: impl Fn() + Send + Sync + 'static) {
        *self.closeout_trigger.lock() = Some(Box::new(trigger));
    }

    /// Hook for the findings registry's resolved-callback: when a
    /// domain's last blocking finding resolves, release its held agents.
    pub fn on_finding_resolved(&self, finding: &Finding) {
        let domain = finding.domain.clone();
        if self.findings.has_blocking_findings(&domain) {
            return;
        }
        let held: Vec<AgentId> = {
            let mut cascade = self.cascade.lock();
            cascade.blocked.remove(&domain).unwrap_or_default()
        };
        if held.is_empty() {
            return;
        }
        tracing::info!(domain = %domain, released = held.len(), "findings cleared, cascade resumes");
        let index = match self.registry.load() {
            Ok(roster) => TopologyIndex::build(roster),
            Err(e) => {
                tracing::warn!(error = %e, "roster load failed during unblock");
                return;
            }
        };
        for agent in held {
            if let Err(e) = self.send_prepare_shutdown(&agent, &index) {
                tracing::warn!(agent_id = %agent, error = %e, "release send failed");
            }
        }
        self.persist_cascade();
    }

    /// Called by the closeout manager once closeout has finished;
    /// performs the final tier.
    pub fn complete_closeout_and_shutdown(&self) -> Result<(), EngineError> {
        let index = TopologyIndex::build(self.registry.load()?);
        self.shutdown_orchestrator(&index)?;
        self.persist_cascade();
        Ok(())
    }

    /// One monitoring cycle.
    pub fn poll_once(&self) -> Result<(), EngineError> {
        let index = TopologyIndex::build(self.registry.load()?);

        self.process_audit_reports(&index)?;

        let tasks = self.tasks.list()?;
        let mut cache = self.status_cache.load()?;
        for task in &tasks {
            let prev = cache.get(&task.id).copied();
            if prev == Some(task.status) {
                continue;
            }
            self.handle_transition(task, prev, &index, &tasks)?;
            cache.insert(task.id.clone(), task.status);
        }
        self.status_cache.save(&cache)?;

        self.evaluate_cascade(&index, &tasks)?;
        self.persist_cascade();
        Ok(())
    }

    pub fn cascade_state(&self) -> CascadeState {
        self.cascade.lock().clone()
    }

    fn handle_transition(
        &self,
        task: &Task,
        prev: Option<TaskStatus>,
        index: &TopologyIndex,
        tasks: &[Task],
    ) -> Result<(), EngineError> {
        let event = Event::new(EventType::TaskStatusChanged, self.clock.now_utc())
            .with_field("task_id", task.id.as_str())
            .with_field(
                "from",
                prev.map(|s| s.to_string()).unwrap_or_else(|| "new".to_string()),
            )
            .with_field("to", task.status.to_string());
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log task transition");
        }

        match task.status {
            TaskStatus::ReadyForReview => self.route_audit(task, index),
            TaskStatus::Approved => self.propose_worker_shutdown(task, index, tasks),
            _ => Ok(()),
        }
    }

    /// `→ ready_for_review`: hand the task to an available audit agent
    /// in its domain.
    fn route_audit(&self, task: &Task, index: &TopologyIndex) -> Result<(), EngineError> {
        let auditor = index
            .domains
            .get(&task.domain)
            .into_iter()
            .flat_map(|d| d.auditors.iter())
            .find(|a| {
                !self.cascade.lock().sent.contains(*a)
                    && index.status(*a) == Some(AgentStatus::Active)
            })
            .cloned();

        let Some(auditor) = auditor else {
            tracing::warn!(task_id = %task.id, domain = %task.domain, "no audit agent available");
            return Ok(());
        };

        self.send_from_orchestrator(&auditor, MessageType::TaskAssignment, Priority::High, index, |m| {
            m.with_field("action", "review")
                .with_field("review_type", "audit")
                .with_field("task_id", task.id.as_str())
        })?;
        tracing::info!(task_id = %task.id, auditor = %auditor, "audit routed");
        Ok(())
    }

    /// `→ approved`: when every task of the assigned worker is approved,
    /// propose its shutdown (or hold it behind the domain's findings).
    fn propose_worker_shutdown(
        &self,
        task: &Task,
        index: &TopologyIndex,
        tasks: &[Task],
    ) -> Result<(), EngineError> {
        let Some(worker) = &task.assigned_to else {
            return Ok(());
        };
        if !cascade::worker_ready(worker, tasks) {
            return Ok(());
        }

        if self.findings.has_blocking_findings(&task.domain) {
            let mut cascade = self.cascade.lock();
            let held = cascade.blocked.entry(task.domain.clone()).or_default();
            if !held.contains(worker) {
                tracing::info!(
                    agent_id = %worker,
                    domain = %task.domain,
                    "worker ready but domain blocked by findings"
                );
                held.push(worker.clone());
            }
            Ok(())
        } else {
            self.send_prepare_shutdown(worker, index)
        }
    }

    /// Auto-approval: consume audit_report messages from the
    /// orchestrator's inbox and apply the compliance threshold.
    fn process_audit_reports(&self, index: &TopologyIndex) -> Result<(), EngineError> {
        let Some(orchestrator) = index.orchestrator.clone() else {
            return Ok(());
        };
        let reports = self.mailboxes.query(
            &orchestrator,
            &MessageQuery {
                message_type: Some(MessageType::AuditReport),
                read: Some(false),
                ..Default::default()
            },
        )?;

        for report in reports {
            let task_id = report.body_str("task_id").map(str::to_string);
            let compliance = report
                .body
                .get("compliance_score")
                .and_then(Value::as_f64);
            if let (Some(task_id), Some(compliance)) = (task_id, compliance) {
                if let Err(e) = self.apply_audit(&task_id, compliance, &report.from) {
                    tracing::warn!(task_id = %task_id, error = %e, "audit application failed");
                }
            }
            self.mailboxes.mark_read(&orchestrator, &report.id)?;
        }
        Ok(())
    }

    fn apply_audit(
        &self,
        task_id: &str,
        compliance: f64,
        auditor: &AgentId,
    ) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        let auto_approve = compliance >= self.config.audit_approval_threshold;

        self.tasks.with_task(task_id, |task| {
            task.audit.compliance_score = Some(compliance);
            task.audit.auditor = Some(auditor.clone());
            task.audit.audited_at = Some(now);
            if auto_approve && task.status == TaskStatus::ReadyForReview {
                task.status = TaskStatus::Approved;
                task.timestamps.updated_at = now;
                task.timestamps.completed_at = Some(now);
            } else if !auto_approve && task.status == TaskStatus::ReadyForReview {
                task.status = TaskStatus::NeedsRevision;
                task.timestamps.updated_at = now;
            }
            Ok(())
        })?;

        let event = Event::new(EventType::AuditCompleted, now)
            .for_agent(auditor.clone())
            .with_field("task_id", task_id)
            .with_field("compliance_score", compliance)
            .with_field("auto_approved", auto_approve);
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log audit");
        }

        // An approved remediation task resolves its finding
        if auto_approve {
            for finding in self.findings.by_linked_task(task_id) {
                if let Err(e) = self.findings.resolve(&finding.id, auditor.clone()) {
                    tracing::warn!(finding = %finding.id, error = %e, "auto-resolve failed");
                }
            }
        }
        Ok(())
    }

    /// Tier-by-tier evaluation. Predicates consult the sent-set, so each
    /// pass sends only what newly unblocked.
    fn evaluate_cascade(&self, index: &TopologyIndex, tasks: &[Task]) -> Result<(), EngineError> {
        // Tier 1 — workers
        let workers: Vec<AgentId> = index.all_workers().cloned().collect();
        for worker in workers {
            if self.already_sent(&worker) || !cascade::worker_ready(&worker, tasks) {
                continue;
            }
            let domain = index.domain_of(&worker).unwrap_or_default().to_string();
            if self.findings.has_blocking_findings(&domain) {
                let mut cascade = self.cascade.lock();
                let held = cascade.blocked.entry(domain).or_default();
                if !held.contains(&worker) {
                    held.push(worker.clone());
                }
            } else {
                self.send_prepare_shutdown(&worker, index)?;
            }
        }

        // Tier 2 — auditors per domain
        let domains: Vec<String> = index.domains.keys().cloned().collect();
        for domain in domains {
            let state = self.cascade.lock().clone();
            if !cascade::auditors_ready(&domain, index, &state)
                || self.findings.has_blocking_findings(&domain)
            {
                continue;
            }
            let auditors = index
                .domains
                .get(&domain)
                .map(|d| d.auditors.clone())
                .unwrap_or_default();
            for auditor in auditors {
                if !self.already_sent(&auditor) {
                    self.send_prepare_shutdown(&auditor, index)?;
                }
            }
        }

        // Tier 3 — security agents
        let state = self.cascade.lock().clone();
        if cascade::security_ready(index, &state) {
            for agent in index.security.clone() {
                if !self.already_sent(&agent) {
                    self.send_prepare_shutdown(&agent, index)?;
                }
            }
        }

        // Tier 4 — POs
        let pos: Vec<AgentId> = index.pos().cloned().collect();
        for po in pos {
            let state = self.cascade.lock().clone();
            if cascade::po_ready(&po, index, &state) && !self.already_sent(&po) {
                self.send_prepare_shutdown(&po, index)?;
            }
        }

        // Tier 5 — context monitors
        let state = self.cascade.lock().clone();
        if cascade::context_monitors_ready(index, &state) {
            for agent in index.context_monitors.clone() {
                if !self.already_sent(&agent) {
                    self.send_prepare_shutdown(&agent, index)?;
                }
            }
        }

        // Tier 6 — orchestrator, via the closeout hook when configured
        let state = self.cascade.lock().clone();
        if cascade::orchestrator_ready(index, &state) && index.orchestrator.is_some() {
            let has_trigger = self.closeout_trigger.lock().is_some();
            if has_trigger {
                if !self.closeout_invoked.swap(true, Ordering::SeqCst) {
                    tracing::info!("final tier reached, invoking closeout");
                    if let Some(trigger) = &*self.closeout_trigger.lock() {
                        trigger();
                    }
                }
            } else {
                self.shutdown_orchestrator(index)?;
            }
        }
        Ok(())
    }

    fn shutdown_orchestrator(&self, index: &TopologyIndex) -> Result<(), EngineError> {
        let Some(orchestrator) = index.orchestrator.clone() else {
            return Ok(());
        };
        if !self.already_sent(&orchestrator) {
            self.send_prepare_shutdown(&orchestrator, index)?;
        }
        if !self.project_completed.swap(true, Ordering::SeqCst) {
            let event = Event::new(EventType::ProjectComplete, self.clock.now_utc())
                .for_agent(orchestrator)
                .with_field("action", "project_complete");
            self.events.append(&event)?;
            tracing::info!("project complete");
        }
        Ok(())
    }

    fn already_sent(&self, agent: &AgentId) -> bool {
        self.cascade.lock().sent.contains(agent)
    }

    fn send_prepare_shutdown(
        &self,
        agent: &AgentId,
        index: &TopologyIndex,
    ) -> Result<(), EngineError> {
        {
            let mut cascade = self.cascade.lock();
            if !cascade.sent.insert(agent.clone()) {
                return Ok(());
            }
        }

        self.send_from_orchestrator(agent, MessageType::LifecycleCommand, Priority::Critical, index, |m| {
            m.with_field("command", "prepare_shutdown")
        })?;

        let event = Event::new(EventType::AgentShutdown, self.clock.now_utc())
            .for_agent(agent.clone())
            .with_field("action", "prepare_shutdown");
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log shutdown send");
        }
        tracing::info!(agent_id = %agent, "prepare_shutdown sent");
        Ok(())
    }

    fn send_from_orchestrator(
        &self,
        to: &AgentId,
        message_type: MessageType,
        priority: Priority,
        index: &TopologyIndex,
        build: impl FnOnce(Message) -> Message,
    ) -> Result<(), EngineError> {
        let from = index
            .orchestrator
            .clone()
            .unwrap_or_else(|| AgentId::new(MONITOR_SENDER));
        let mut message =
            build(Message::new(from.as_str(), to.as_str(), message_type).with_priority(priority));
        message.id = MessageId::generate();
        message.timestamp = self.clock.now_utc();
        self.mailboxes.append(to, message)?;
        Ok(())
    }

    fn persist_cascade(&self) {
        let cascade = self.cascade.lock().clone();
        if let Err(e) = write_json_atomic(&self.cascade_path, &cascade) {
            tracing::warn!(error = %e, "failed to persist cascade state");
        }
    }
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
