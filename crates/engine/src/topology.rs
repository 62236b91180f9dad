// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-cycle index of the fleet, built from the registry roster.
//!
//! The shutdown cascade and the completion monitor consult this instead
//! of re-scanning the roster: agents keyed by id, grouped per domain,
//! with the cross-cutting and supervisory roles pulled out.

use cpost_core::{AgentId, AgentStatus, RegistryEntry, Role};
use std::collections::HashMap;

/// Agents of one domain.
#[derive(Debug, Default, Clone)]
pub struct DomainAgents {
    pub workers: Vec<AgentId>,
    pub auditors: Vec<AgentId>,
    pub po: Option<AgentId>,
}

/// Role-and-domain index over the roster.
#[derive(Debug, Default, Clone)]
pub struct TopologyIndex {
    pub by_agent: HashMap<AgentId, RegistryEntry>,
    pub domains: HashMap<String, DomainAgents>,
    /// Cross-cutting agents: security, testing, docs
    pub security: Vec<AgentId>,
    pub context_monitors: Vec<AgentId>,
    pub orchestrator: Option<AgentId>,
}

impl TopologyIndex {
    pub fn build(roster: HashMap<AgentId, RegistryEntry>) -> Self {
        let mut index = TopologyIndex::default();
        let mut ids: Vec<AgentId> = roster.keys().cloned().collect();
        ids.sort();

        for id in ids {
            let entry = &roster[&id];
            let domain = index.domains.entry(entry.domain.clone()).or_default();
            match entry.role {
                Role::Worker | Role::Specialist => domain.workers.push(id.clone()),
                Role::Audit => domain.auditors.push(id.clone()),
                Role::Po | Role::Coordinator => domain.po = Some(id.clone()),
                Role::Security | Role::Testing | Role::Docs => index.security.push(id.clone()),
                Role::ContextMonitor => index.context_monitors.push(id.clone()),
                Role::Orchestrator => index.orchestrator = Some(id.clone()),
            }
        }
        index.by_agent = roster;
        index
    }

    pub fn status(&self, agent: &AgentId) -> Option<AgentStatus> {
        self.by_agent.get(agent).map(|e| e.status)
    }

    pub fn domain_of(&self, agent: &AgentId) -> Option<&str> {
        self.by_agent.get(agent).map(|e| e.domain.as_str())
    }

    pub fn all_workers(&self) -> impl Iterator<Item = &AgentId> {
        self.domains.values().flat_map(|d| d.workers.iter())
    }

    pub fn all_auditors(&self) -> impl Iterator<Item = &AgentId> {
        self.domains.values().flat_map(|d| d.auditors.iter())
    }

    pub fn pos(&self) -> impl Iterator<Item = &AgentId> {
        self.domains.values().filter_map(|d| d.po.as_ref())
    }

    /// Domains a PO owns (a PO may own several).
    pub fn domains_of_po(&self, po: &AgentId) -> Vec<&str> {
        self.domains
            .iter()
            .filter(|(_, agents)| agents.po.as_ref() == Some(po))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
