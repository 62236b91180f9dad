// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replacement flows: one run of the Memory Snapshot Protocol.

use crate::agent::{AgentId, Role};
use crate::zone::ContextUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::string_id! {
    /// Unique identifier for a replacement flow (`flow-<uuid>`).
    pub struct FlowId("flow-");
}

/// Phase of a replacement flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    SnapshotRequested,
    SnapshotReceived,
    SnapshotValidated,
    ReplacementPrepared,
    ReplacementSpawned,
    OriginalShutdown,
    Completed,
    Failed,
}

impl FlowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowPhase::Completed | FlowPhase::Failed)
    }
}

crate::simple_display! {
    FlowPhase {
        Idle => "idle",
        SnapshotRequested => "snapshot_requested",
        SnapshotReceived => "snapshot_received",
        SnapshotValidated => "snapshot_validated",
        ReplacementPrepared => "replacement_prepared",
        ReplacementSpawned => "replacement_spawned",
        OriginalShutdown => "original_shutdown",
        Completed => "completed",
        Failed => "failed",
    }
}

/// State of one active (or archived) replacement flow.
///
/// The agent's role, domain, and task ids are captured at initiation so
/// the flow can complete even if the registry entry changes underneath.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementFlow {
    pub flow_id: FlowId,
    pub agent_id: AgentId,
    pub phase: FlowPhase,
    pub reason: String,
    pub role: Role,
    pub domain: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_usage: Option<ContextUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub best_quality_score: f64,
    pub initiated_at: DateTime<Utc>,
    /// When the snapshot request was last issued (drives timeout re-issue)
    pub snapshot_requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplacementFlow {
    pub fn new(
        agent_id: impl Into<AgentId>,
        reason: impl Into<String>,
        role: Role,
        domain: impl Into<String>,
        task_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            flow_id: FlowId::generate(),
            agent_id: agent_id.into(),
            phase: FlowPhase::Idle,
            reason: reason.into(),
            role,
            domain: domain.into(),
            task_ids,
            context_usage: None,
            quality_score: None,
            retry_count: 0,
            best_quality_score: 0.0,
            initiated_at: now,
            snapshot_requested_at: now,
            replacement_agent_id: None,
            error: None,
        }
    }
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
