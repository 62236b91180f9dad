// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Findings registry.
//!
//! Cross-cutting agents (security, testing, docs) file audit reports
//! that become findings. A domain with an open error/critical finding is
//! blocked: the shutdown cascade holds its agents until the finding
//! resolves, at which point registered callbacks fire and the cascade
//! resumes.

use crate::error::EngineError;
use cpost_core::{
    AgentId, Clock, Event, EventType, Finding, FindingId, FindingStatus, Role, Severity,
};
use cpost_storage::{write_json_atomic, EventLog, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

type ResolvedCallback = Box<dyn Fn(&Finding) + Send + Sync>;

/// In-memory registry persisted to `findings.json` after every mutation.
pub struct FindingsRegistry<C: Clock> {
    findings: Mutex<HashMap<FindingId, Finding>>,
    path: PathBuf,
    events: EventLog,
    resolved_callbacks: Mutex<Vec<ResolvedCallback>>,
    clock: C,
}

impl<C: Clock> FindingsRegistry<C> {
    /// Open the registry, reloading any persisted findings.
    pub fn open(path: PathBuf, events: EventLog, clock: C) -> Result<Self, StorageError> {
        let findings: HashMap<FindingId, Finding> =
            cpost_storage::read_json_opt(&path)?.unwrap_or_default();
        Ok(Self {
            findings: Mutex::new(findings),
            path,
            events,
            resolved_callbacks: Mutex::new(Vec::new()),
            clock,
        })
    }

    /// Whether an audit source is allowed to file findings: cross-cutting
    /// role, or an agent-id prefix naming one when the role is unknown.
    pub fn is_cross_cutting_source(role: Option<Role>, agent_id: &AgentId) -> bool {
        match role {
            Some(role) => role.is_cross_cutting(),
            None => ["security-", "testing-", "docs-"]
                .iter()
                .any(|prefix| agent_id.as_str().starts_with(prefix)),
        }
    }

    /// Register a finding from an audit report. Severity arrives as a
    /// label; unknown labels (and string-only findings) default to
    /// warning.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &self,
        domain: impl Into<String>,
        source_agent: AgentId,
        source_role: Role,
        task_id: Option<String>,
        severity: &str,
        category: impl Into<String>,
        description: impl Into<String>,
        recommendation: Option<String>,
    ) -> Result<FindingId, EngineError> {
        if !Self::is_cross_cutting_source(Some(source_role), &source_agent) {
            return Err(EngineError::Validation(format!(
                "role {source_role} may not file findings"
            )));
        }

        let finding = Finding {
            id: FindingId::generate(),
            domain: domain.into(),
            source_agent: source_agent.clone(),
            source_role,
            task_id,
            severity: Severity::parse_lenient(severity),
            category: category.into(),
            description: description.into(),
            recommendation,
            status: FindingStatus::Open,
            created_at: self.clock.now_utc(),
            resolved_at: None,
            resolved_by: None,
            linked_task: None,
        };
        let id = finding.id.clone();

        {
            let mut findings = self.findings.lock();
            findings.insert(id.clone(), finding.clone());
            self.persist(&findings)?;
        }
        self.log(
            EventType::FindingRegistered,
            Some(source_agent),
            &finding,
        );
        Ok(id)
    }

    /// Mark a finding as being remediated. Idempotent.
    pub fn mark_in_progress(&self, id: &FindingId) -> Result<(), EngineError> {
        let mut findings = self.findings.lock();
        let finding = findings
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("finding {id}")))?;
        match finding.status {
            FindingStatus::InProgress => Ok(()),
            FindingStatus::Open => {
                finding.status = FindingStatus::InProgress;
                self.persist(&findings)?;
                Ok(())
            }
            FindingStatus::Resolved => Err(EngineError::Consistency(format!(
                "finding {id} is already resolved"
            ))),
        }
    }

    /// Resolve a finding. One-shot: resolving twice is an error. Fires
    /// every registered resolved-callback.
    pub fn resolve(&self, id: &FindingId, resolver: AgentId) -> Result<(), EngineError> {
        let resolved = {
            let mut findings = self.findings.lock();
            let finding = findings
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(format!("finding {id}")))?;
            if finding.status == FindingStatus::Resolved {
                return Err(EngineError::Consistency(format!(
                    "finding {id} is already resolved"
                )));
            }
            finding.status = FindingStatus::Resolved;
            finding.resolved_at = Some(self.clock.now_utc());
            finding.resolved_by = Some(resolver);
            let resolved = finding.clone();
            self.persist(&findings)?;
            resolved
        };

        self.log(EventType::FindingResolved, None, &resolved);
        for callback in self.resolved_callbacks.lock().iter() {
            callback(&resolved);
        }
        Ok(())
    }

    /// Link a remediation task to a finding.
    pub fn link_task(&self, id: &FindingId, task_id: impl Into<String>) -> Result<(), EngineError> {
        let mut findings = self.findings.lock();
        let finding = findings
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("finding {id}")))?;
        finding.linked_task = Some(task_id.into());
        self.persist(&findings)?;
        Ok(())
    }

    pub fn get(&self, id: &FindingId) -> Option<Finding> {
        self.findings.lock().get(id).cloned()
    }

    pub fn by_domain(&self, domain: &str) -> Vec<Finding> {
        let mut out: Vec<Finding> = self
            .findings
            .lock()
            .values()
            .filter(|f| f.domain == domain)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Findings whose linked remediation task is `task_id`.
    pub fn by_linked_task(&self, task_id: &str) -> Vec<Finding> {
        self.findings
            .lock()
            .values()
            .filter(|f| f.linked_task.as_deref() == Some(task_id))
            .cloned()
            .collect()
    }

    /// Every domain with at least one blocking finding.
    pub fn blocked_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .findings
            .lock()
            .values()
            .filter(|f| f.is_blocking())
            .map(|f| f.domain.clone())
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    /// Gate for the shutdown cascade.
    pub fn has_blocking_findings(&self, domain: &str) -> bool {
        self.findings
            .lock()
            .values()
            .any(|f| f.domain == domain && f.is_blocking())
    }

    /// Register a callback fired after every resolution.
    pub fn on_resolved(&self, callback: impl Fn(&Finding) + Send + Sync + 'static) {
        self.resolved_callbacks.lock().push(Box::new(callback));
    }

    fn persist(&self, findings: &HashMap<FindingId, Finding>) -> Result<(), StorageError> {
        write_json_atomic(&self.path, findings)
    }

    fn log(&self, event_type: EventType, agent: Option<AgentId>, finding: &Finding) {
        let mut event = Event::new(event_type, self.clock.now_utc())
            .with_field("finding_id", finding.id.as_str())
            .with_field("domain", finding.domain.as_str())
            .with_field("severity", finding.severity.to_string());
        if let Some(agent) = agent {
            event = event.for_agent(agent);
        }
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log finding event");
        }
    }

}

#[cfg(test)]
#[path = "findings_tests.rs"]
mod tests;
