// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn-queue entries and durable spawn requests.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

crate::string_id! {
    /// Unique identifier for a spawn-queue entry (`sq-<uuid>`).
    pub struct SpawnEntryId("sq-");
}

/// Roles the spawn queue may admit. Orchestrators, POs, context monitors,
/// and security agents are never spawned through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnRole {
    Worker,
    Audit,
}

crate::simple_display! {
    SpawnRole {
        Worker => "worker",
        Audit => "audit",
    }
}

/// Admission state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnEntryStatus {
    /// Newly filed, not yet evaluated
    Pending,
    /// Waiting on task or domain dependencies
    DependencyWait,
    /// Dependencies satisfied, waiting on budget capacity
    Queued,
    /// Handed to the launcher
    Spawning,
    Spawned,
    Rejected,
}

impl SpawnEntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SpawnEntryStatus::Spawned | SpawnEntryStatus::Rejected)
    }
}

crate::simple_display! {
    SpawnEntryStatus {
        Pending => "pending",
        DependencyWait => "dependency_wait",
        Queued => "queued",
        Spawning => "spawning",
        Spawned => "spawned",
        Rejected => "rejected",
    }
}

/// One request for a new agent, persisted one-file-per-entry and
/// re-evaluated on capacity release or dependency resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnQueueEntry {
    pub id: SpawnEntryId,
    pub requested_by: AgentId,
    pub domain: String,
    pub role: SpawnRole,
    pub reason: String,
    pub status: SpawnEntryStatus,
    #[serde(default)]
    pub task_dependencies: Vec<String>,
    #[serde(default)]
    pub domain_dependencies: Vec<String>,
    /// Fraction of a dependency domain's tasks that must be terminal
    /// before this entry advances (0–1)
    #[serde(default)]
    pub domain_dependency_threshold: f64,
    #[serde(default)]
    pub suggested_features: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Durable spawn request consumed by the external session launcher.
///
/// Deleted by the launcher after the session is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub request_id: String,
    pub replacement_agent_id: AgentId,
    pub original_agent_id: AgentId,
    /// Where the augmented INSTRUCTIONS.md was written
    pub instructions_path: PathBuf,
    /// Full text of the prepared instructions
    pub prepared_instructions: String,
    /// Snapshot seeded into the replacement (PRD or machine format)
    pub snapshot: Value,
    #[serde(default)]
    pub task_ids: Vec<String>,
    pub role: String,
    pub domain: String,
    pub handoff_number: u32,
    pub project_path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
