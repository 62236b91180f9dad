// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn queue: budgeted, dependency-aware admission control.
//!
//! POs request new agents; the queue decides whether to admit, delay, or
//! reject. Entries persist one-file-per-id and non-terminal entries are
//! reloaded on startup, so a restart re-evaluates exactly the requests
//! that were still in flight.

use crate::error::EngineError;
use cpost_core::{
    AgentId, AgentStatus, Clock, Event, EventType, SpawnEntryId, SpawnEntryStatus,
    SpawnQueueEntry, SpawnRole, SupervisorConfig, Topology,
};
use cpost_storage::{AgentRegistry, EventLog, SpawnQueueStore, TaskStore};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Outcome of the atomic budget check.
#[derive(Debug, Clone)]
pub struct BudgetCheck {
    pub allowed: bool,
    pub reason: Option<String>,
    pub total_active: usize,
    pub domain_count: usize,
    pub pending_queue_depth: usize,
}

pub struct SpawnQueue<C: Clock> {
    entries: Mutex<HashMap<SpawnEntryId, SpawnQueueEntry>>,
    store: SpawnQueueStore,
    registry: AgentRegistry,
    tasks: TaskStore,
    topology: Topology,
    config: SupervisorConfig,
    events: EventLog,
    clock: C,
}

impl<C: Clock> SpawnQueue<C> {
    /// Open the queue, reloading non-terminal entries from disk.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        store: SpawnQueueStore,
        registry: AgentRegistry,
        tasks: TaskStore,
        topology: Topology,
        config: SupervisorConfig,
        events: EventLog,
        clock: C,
    ) -> Result<Self, EngineError> {
        let entries = store
            .load_non_terminal()?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        Ok(Self {
            entries: Mutex::new(entries),
            store,
            registry,
            tasks,
            topology,
            config,
            events,
            clock,
        })
    }

    pub fn get(&self, id: &SpawnEntryId) -> Option<SpawnQueueEntry> {
        self.entries.lock().get(id).cloned()
    }

    /// The atomic budget check: topology membership, role, requester
    /// authority, per-domain ceiling, global ceiling.
    pub fn check_budget(
        &self,
        domain: &str,
        role: SpawnRole,
        requested_by: &AgentId,
    ) -> Result<BudgetCheck, EngineError> {
        self.budget_excluding(domain, role, requested_by, None)
    }

    /// Budget check that may exclude one entry from the pending depth —
    /// an entry being evaluated must not block itself.
    fn budget_excluding(
        &self,
        domain: &str,
        _role: SpawnRole,
        requested_by: &AgentId,
        exclude: Option<&SpawnEntryId>,
    ) -> Result<BudgetCheck, EngineError> {
        let roster = self.registry.load()?;
        let total_active = roster
            .values()
            .filter(|e| e.status == AgentStatus::Active)
            .count();
        let domain_count = roster
            .values()
            .filter(|e| e.status == AgentStatus::Active && e.domain == domain)
            .count();
        let pending_queue_depth = self
            .entries
            .lock()
            .values()
            .filter(|e| !e.status.is_terminal() && Some(&e.id) != exclude)
            .count();

        let deny = |reason: String| BudgetCheck {
            allowed: false,
            reason: Some(reason),
            total_active,
            domain_count,
            pending_queue_depth,
        };

        if !self.topology.has_domain(domain) {
            return Ok(deny(format!("unknown domain: {domain}")));
        }
        // Role is typed: only worker/audit exist as SpawnRole, which is
        // exactly the set the queue may admit.
        match self.topology.po_of(domain) {
            Some(po) if po == requested_by => {}
            _ => {
                return Ok(deny(format!(
                    "{requested_by} is not the PO of domain {domain}"
                )))
            }
        }
        if let Some(max) = self.config.max_per_domain {
            if domain_count >= max {
                return Ok(deny(format!("domain {domain} is at capacity ({max})")));
            }
        }
        if total_active + pending_queue_depth >= self.config.max_agents {
            return Ok(deny(format!(
                "fleet is at capacity ({})",
                self.config.max_agents
            )));
        }

        Ok(BudgetCheck {
            allowed: true,
            reason: None,
            total_active,
            domain_count,
            pending_queue_depth,
        })
    }

    /// File a spawn request and evaluate it immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue(
        &self,
        requested_by: AgentId,
        domain: impl Into<String>,
        role: SpawnRole,
        reason: impl Into<String>,
        task_dependencies: Vec<String>,
        domain_dependencies: Vec<String>,
        domain_dependency_threshold: f64,
        suggested_features: Vec<String>,
    ) -> Result<SpawnEntryId, EngineError> {
        let entry = SpawnQueueEntry {
            id: SpawnEntryId::generate(),
            requested_by,
            domain: domain.into(),
            role,
            reason: reason.into(),
            status: SpawnEntryStatus::Pending,
            task_dependencies,
            domain_dependencies,
            domain_dependency_threshold,
            suggested_features,
            created_at: self.clock.now_utc(),
            resolved_at: None,
            spawned_agent_id: None,
            rejection_reason: None,
        };
        let id = entry.id.clone();
        self.entries.lock().insert(id.clone(), entry);
        self.evaluate(&id)?;
        Ok(id)
    }

    /// Evaluate one entry: dependencies first, then the budget.
    fn evaluate(&self, id: &SpawnEntryId) -> Result<SpawnEntryStatus, EngineError> {
        let entry = self
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("spawn entry {id}")))?;
        if entry.status.is_terminal() || entry.status == SpawnEntryStatus::Spawning {
            return Ok(entry.status);
        }

        let status = if !self.task_dependencies_met(&entry)? {
            SpawnEntryStatus::DependencyWait
        } else if !self.domain_dependencies_met(&entry)? {
            SpawnEntryStatus::DependencyWait
        } else {
            let budget =
                self.budget_excluding(&entry.domain, entry.role, &entry.requested_by, Some(id))?;
            if budget.allowed {
                SpawnEntryStatus::Queued
            } else if is_hard_denial(&budget) {
                self.reject(id, budget.reason.unwrap_or_default())?;
                return Ok(SpawnEntryStatus::Rejected);
            } else {
                // Capacity pressure: stay queued until a release
                SpawnEntryStatus::Queued
            }
        };

        self.set_status(id, status)?;
        Ok(status)
    }

    fn task_dependencies_met(&self, entry: &SpawnQueueEntry) -> Result<bool, EngineError> {
        for task_id in &entry.task_dependencies {
            match self.tasks.get(task_id) {
                Ok(task) if task.status.satisfies_dependency() => {}
                Ok(_) => return Ok(false),
                Err(cpost_storage::StorageError::NotFound { .. }) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    fn domain_dependencies_met(&self, entry: &SpawnQueueEntry) -> Result<bool, EngineError> {
        for domain in &entry.domain_dependencies {
            if self.domain_progress(domain)? < entry.domain_dependency_threshold {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fraction of a domain's tasks that reached approval. A domain with
    /// no tasks has made no observable progress.
    pub fn domain_progress(&self, domain: &str) -> Result<f64, EngineError> {
        let tasks = self.tasks.list()?;
        let domain_tasks: Vec<_> = tasks.iter().filter(|t| t.domain == domain).collect();
        if domain_tasks.is_empty() {
            return Ok(0.0);
        }
        let done = domain_tasks
            .iter()
            .filter(|t| t.status.satisfies_dependency())
            .count();
        Ok(done as f64 / domain_tasks.len() as f64)
    }

    /// Oldest queued entry whose budget currently clears, moved to
    /// `spawning`. FIFO among ready entries.
    pub fn next_ready(&self) -> Result<Option<SpawnQueueEntry>, EngineError> {
        let queued: Vec<SpawnQueueEntry> = {
            let entries = self.entries.lock();
            let mut queued: Vec<_> = entries
                .values()
                .filter(|e| e.status == SpawnEntryStatus::Queued)
                .cloned()
                .collect();
            queued.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            queued
        };

        for entry in queued {
            let budget =
                self.budget_excluding(&entry.domain, entry.role, &entry.requested_by, Some(&entry.id))?;
            if budget.allowed {
                self.set_status(&entry.id, SpawnEntryStatus::Spawning)?;
                return Ok(self.get(&entry.id));
            }
        }
        Ok(None)
    }

    /// The launcher confirmed the spawn.
    pub fn mark_spawned(
        &self,
        id: &SpawnEntryId,
        agent_id: AgentId,
    ) -> Result<(), EngineError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("spawn entry {id}")))?;
        if !matches!(
            entry.status,
            SpawnEntryStatus::Spawning | SpawnEntryStatus::Queued
        ) {
            return Err(EngineError::Consistency(format!(
                "entry {id} is {}, not spawning",
                entry.status
            )));
        }
        entry.status = SpawnEntryStatus::Spawned;
        entry.spawned_agent_id = Some(agent_id.clone());
        entry.resolved_at = Some(self.clock.now_utc());
        self.store.save(entry)?;

        let event = Event::new(EventType::AgentSpawned, self.clock.now_utc())
            .for_agent(agent_id)
            .with_field("spawn_entry", id.as_str());
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log spawn");
        }
        Ok(())
    }

    /// Terminal rejection.
    pub fn mark_rejected(
        &self,
        id: &SpawnEntryId,
        reason: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.reject(id, reason.into())
    }

    /// Re-evaluate every waiting entry after capacity or dependency
    /// movement; returns the ids whose status changed.
    pub fn release(&self) -> Result<Vec<SpawnEntryId>, EngineError> {
        let waiting: Vec<SpawnEntryId> = self
            .entries
            .lock()
            .values()
            .filter(|e| e.status == SpawnEntryStatus::DependencyWait)
            .map(|e| e.id.clone())
            .collect();

        let mut changed = Vec::new();
        for id in waiting {
            let before = SpawnEntryStatus::DependencyWait;
            let after = self.evaluate(&id)?;
            if after != before {
                changed.push(id);
            }
        }
        Ok(changed)
    }

    /// Deterministic agent-id generation:
    /// `<role>-<domain>-<max existing number + 1>`, scanning both the
    /// registry and already-spawned queue entries.
    pub fn generate_agent_id(
        &self,
        role: SpawnRole,
        domain: &str,
    ) -> Result<AgentId, EngineError> {
        let prefix = format!("{role}-{domain}-");
        let mut max = 0u32;

        for agent in self.registry.load()?.keys() {
            max = max.max(trailing_number(agent.as_str(), &prefix));
        }
        for entry in self.entries.lock().values() {
            if let Some(agent) = &entry.spawned_agent_id {
                max = max.max(trailing_number(agent.as_str(), &prefix));
            }
        }
        Ok(AgentId::new(format!("{prefix}{}", max + 1)))
    }

    fn reject(&self, id: &SpawnEntryId, reason: String) -> Result<(), EngineError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("spawn entry {id}")))?;
        entry.status = SpawnEntryStatus::Rejected;
        entry.rejection_reason = Some(reason.clone());
        entry.resolved_at = Some(self.clock.now_utc());
        self.store.save(entry)?;
        tracing::info!(entry = %id, reason = %reason, "spawn request rejected");
        Ok(())
    }

    fn set_status(&self, id: &SpawnEntryId, status: SpawnEntryStatus) -> Result<(), EngineError> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(id) {
            entry.status = status;
            self.store.save(entry)?;
        }
        Ok(())
    }
}

/// Hard denials reject the entry outright; capacity pressure only delays
/// it.
fn is_hard_denial(budget: &BudgetCheck) -> bool {
    budget
        .reason
        .as_deref()
        .is_some_and(|r| r.contains("unknown domain") || r.contains("not the PO"))
}

fn trailing_number(agent: &str, prefix: &str) -> u32 {
    agent
        .strip_prefix(prefix)
        .and_then(|rest| rest.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "spawn_queue_tests.rs"]
mod tests;
