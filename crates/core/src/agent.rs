// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity, roles, and registry entries.
//!
//! AgentId is distinct from the tmux session name (internal to adapters).
//! An agent is a single supervised process; a replacement spawned through
//! the Memory Snapshot Protocol derives its id from the original with an
//! `-r<N>` suffix encoding the handoff depth.

use crate::message::MessageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;

/// Unique identifier for an agent instance.
///
/// Typically formatted as `{role}-{domain}-{n}` but the format is opaque
/// to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    /// Create a new AgentId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this AgentId.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base id with any `-r<N>` replacement suffix stripped.
    ///
    /// `worker-1-r2` → `worker-1`. Stripping before re-suffixing keeps the
    /// handoff depth monotonic instead of stacking (`worker-1-r1-r2`).
    pub fn base(&self) -> &str {
        if let Some(pos) = self.0.rfind("-r") {
            let suffix = &self.0[pos + 2..];
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                return &self.0[..pos];
            }
        }
        &self.0
    }

    /// Replacement id for handoff number `n`: `<base>-r<n>`.
    pub fn replacement(&self, n: u32) -> AgentId {
        AgentId(format!("{}-r{}", self.base(), n))
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for AgentId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AgentId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Role of an agent in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Orchestrator,
    Po,
    Coordinator,
    Worker,
    Specialist,
    Audit,
    Security,
    Testing,
    Docs,
    ContextMonitor,
}

impl Role {
    /// Message types this role is permitted to send.
    ///
    /// A static lookup so the permission check is one set-membership test;
    /// adding a role means adding one arm here.
    pub fn allowed_message_types(&self) -> &'static [MessageType] {
        use MessageType::*;
        match self {
            Role::Orchestrator => &[
                TaskAssignment,
                Feedback,
                TaskUpdate,
                Escalation,
                HumanApprovalRequest,
                LifecycleCommand,
            ],
            Role::Po | Role::Coordinator => &[TaskAssignment, Feedback, TaskUpdate, Escalation],
            Role::Worker | Role::Specialist => {
                &[TaskUpdate, PeerMessage, Escalation, MemoryHandoff]
            }
            Role::Audit | Role::Security | Role::Testing | Role::Docs => {
                &[AuditReport, Escalation]
            }
            Role::ContextMonitor => &[LifecycleCommand, TaskUpdate, Escalation],
        }
    }

    /// Whether this role may send the given message type.
    pub fn may_send(&self, message_type: MessageType) -> bool {
        self.allowed_message_types().contains(&message_type)
    }

    /// Cross-cutting roles whose audit reports become findings that can
    /// gate a domain's shutdown.
    pub fn is_cross_cutting(&self) -> bool {
        matches!(self, Role::Security | Role::Testing | Role::Docs)
    }
}

crate::simple_display! {
    Role {
        Orchestrator => "orchestrator",
        Po => "po",
        Coordinator => "coordinator",
        Worker => "worker",
        Specialist => "specialist",
        Audit => "audit",
        Security => "security",
        Testing => "testing",
        Docs => "docs",
        ContextMonitor => "context-monitor",
    }
}

/// Lifecycle status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent session is alive and supervised
    Active,
    /// Agent is deliberately suspended
    Paused,
    /// Session liveness check failed
    Dead,
    /// Agent completed the shutdown handshake
    Shutdown,
}

crate::simple_display! {
    AgentStatus {
        Active => "active",
        Paused => "paused",
        Dead => "dead",
        Shutdown => "shutdown",
    }
}

/// One agent's entry in the durable registry.
///
/// Created on spawn, mutated by the context monitor (status) and the
/// handoff manager (handoff_count), never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Name of the tmux session hosting the agent
    pub tmux_session: String,
    pub role: Role,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Path to the agent runtime's transcript file, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub status: AgentStatus,
    pub launched_at: DateTime<Utc>,
    #[serde(default)]
    pub handoff_count: u32,
}

crate::builder! {
    pub struct RegistryEntryBuilder => RegistryEntry {
        into {
            tmux_session: String = "cp-test",
            domain: String = "backend",
        }
        set {
            role: Role = Role::Worker,
            status: AgentStatus = AgentStatus::Active,
            handoff_count: u32 = 0,
        }
        option {
            task_id: String = None,
            transcript_path: PathBuf = None,
            pid: u32 = None,
        }
        computed {
            launched_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
