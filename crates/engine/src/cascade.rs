// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown cascade tiers.
//!
//! The cascade is a directed graph, not a linear chain: auditors depend
//! on their domain's workers, security agents on all auditors, POs on
//! workers + auditors + security, context monitors on the POs, and the
//! orchestrator on everyone. Each tier is a predicate over the topology
//! index so adding a role means adding one predicate.

use crate::topology::TopologyIndex;
use cpost_core::{AgentId, AgentStatus, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Shutdown-order class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Workers = 1,
    Auditors = 2,
    Security = 3,
    Pos = 4,
    ContextMonitors = 5,
    Orchestrator = 6,
}

/// Durable cascade bookkeeping.
///
/// `sent` makes prepare_shutdown idempotent across polls and restarts;
/// `blocked` remembers which agents were ready but held by a domain's
/// findings so resolution can release exactly those.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CascadeState {
    #[serde(default)]
    pub sent: HashSet<AgentId>,
    #[serde(default)]
    pub blocked: HashMap<String, Vec<AgentId>>,
}

impl CascadeState {
    /// An agent counts as down once it was told to shut down or its
    /// registry status says so.
    pub fn is_down(&self, agent: &AgentId, index: &TopologyIndex) -> bool {
        self.sent.contains(agent) || index.status(agent) == Some(AgentStatus::Shutdown)
    }

    fn all_down<'a>(
        &self,
        agents: impl Iterator<Item = &'a AgentId>,
        index: &TopologyIndex,
    ) -> bool {
        agents.into_iter().all(|a| self.is_down(a, index))
    }
}

/// Tier 1 — a worker may stop when every task assigned to it is
/// terminal and every one of those terminals is an approval.
pub fn worker_ready(worker: &AgentId, tasks: &[Task]) -> bool {
    let assigned: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.assigned_to.as_ref() == Some(worker))
        .collect();
    !assigned.is_empty()
        && assigned.iter().all(|t| t.status.is_terminal())
        && assigned.iter().all(|t| t.status == TaskStatus::Approved)
}

/// Tier 2 — a domain's auditors may stop when all its workers are down.
pub fn auditors_ready(domain: &str, index: &TopologyIndex, state: &CascadeState) -> bool {
    match index.domains.get(domain) {
        Some(agents) => state.all_down(agents.workers.iter(), index),
        None => false,
    }
}

/// Tier 3 — security agents stop after every auditor in every domain.
pub fn security_ready(index: &TopologyIndex, state: &CascadeState) -> bool {
    state.all_down(index.all_auditors(), index)
}

/// Tier 4 — a PO stops when its domains' workers and auditors are down
/// and all security agents are down.
pub fn po_ready(po: &AgentId, index: &TopologyIndex, state: &CascadeState) -> bool {
    let domains = index.domains_of_po(po);
    let own_done = domains.iter().all(|domain| {
        index.domains.get(*domain).is_some_and(|agents| {
            state.all_down(agents.workers.iter().chain(agents.auditors.iter()), index)
        })
    });
    own_done && state.all_down(index.security.iter(), index)
}

/// Tier 5 — context monitors stop when every PO is down (or none exist)
/// and every worker and auditor is down.
pub fn context_monitors_ready(index: &TopologyIndex, state: &CascadeState) -> bool {
    state.all_down(index.pos(), index)
        && state.all_down(index.all_workers(), index)
        && state.all_down(index.all_auditors(), index)
}

/// Tier 6 — the orchestrator goes last.
pub fn orchestrator_ready(index: &TopologyIndex, state: &CascadeState) -> bool {
    let orchestrator = index.orchestrator.as_ref();
    index
        .by_agent
        .keys()
        .filter(|a| Some(*a) != orchestrator)
        .all(|a| state.is_down(a, index))
}

#[cfg(test)]
#[path = "cascade_tests.rs"]
mod tests;
