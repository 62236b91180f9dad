// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory snapshot formats.
//!
//! Two flavors exist: the machine-written [`MemorySnapshot`] the context
//! monitor produces from transcript readings, and the richer
//! [`PrdSnapshot`] a departing agent writes in response to a
//! `write_memory_snapshot` lifecycle command. Both are write-once on disk.

use crate::agent::AgentId;
use crate::zone::ContextUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::string_id! {
    /// Unique identifier for a stored snapshot (bare v4 UUID).
    pub struct SnapshotId("");
}

/// Machine-format snapshot of an agent's working state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub snapshot_id: SnapshotId,
    pub agent_id: AgentId,
    pub timestamp: DateTime<Utc>,
    pub context_usage: ContextUsage,
    #[serde(default)]
    pub decision_log: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_signal: Option<String>,
    #[serde(default)]
    pub memory_state: Map<String, Value>,
    #[serde(default)]
    pub model_performance: Map<String, Value>,
}

impl MemorySnapshot {
    /// Snapshot carrying only a usage reading; decision log and friends
    /// are unknown to the machine path.
    pub fn from_reading(
        agent_id: impl Into<AgentId>,
        usage: ContextUsage,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            snapshot_id: SnapshotId::new(uuid::Uuid::new_v4().to_string()),
            agent_id: agent_id.into(),
            timestamp,
            context_usage: usage,
            decision_log: Vec::new(),
            task_status: None,
            handoff_signal: None,
            memory_state: Map::new(),
            model_performance: Map::new(),
        }
    }
}

/// Current-state section of a PRD-format snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_estimate: Option<String>,
}

impl SnapshotState {
    pub fn is_empty(&self) -> bool {
        self.current_step.is_none()
            && self.progress_summary.is_none()
            && self.completion_estimate.is_none()
    }
}

/// One carried-forward decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDecision {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

/// File-level progress accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesState {
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub in_progress: Vec<String>,
    #[serde(default)]
    pub not_started: Vec<String>,
}

impl FilesState {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.in_progress.is_empty() && self.not_started.is_empty()
    }

    /// All files mentioned anywhere in the state.
    pub fn all_files(&self) -> impl Iterator<Item = &String> {
        self.completed
            .iter()
            .chain(self.in_progress.iter())
            .chain(self.not_started.iter())
    }
}

/// Rich snapshot a departing agent writes for its replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdSnapshot {
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub handoff_number: u32,
    /// Usage fraction at the time of writing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_at_snapshot: Option<f64>,
    #[serde(default)]
    pub state: SnapshotState,
    #[serde(default)]
    pub decisions: Vec<SnapshotDecision>,
    #[serde(default)]
    pub gotchas: Vec<String>,
    #[serde(default)]
    pub files_state: FilesState,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub dependencies_discovered: Vec<String>,
}

impl PrdSnapshot {
    /// Skeletal snapshot used when force-handoff proceeds with nothing
    /// usable from the departing agent.
    pub fn skeletal(agent_id: impl Into<AgentId>, handoff_number: u32) -> Self {
        Self {
            agent_id: agent_id.into(),
            task_id: None,
            handoff_number,
            context_at_snapshot: None,
            state: SnapshotState::default(),
            decisions: Vec::new(),
            gotchas: Vec::new(),
            files_state: FilesState::default(),
            next_steps: Vec::new(),
            dependencies_discovered: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
