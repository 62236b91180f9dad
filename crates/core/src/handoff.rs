// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handoff records: transactional task transfer between agents.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Phase of an active handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPhase {
    Initiated,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl HandoffPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandoffPhase::Completed | HandoffPhase::Failed | HandoffPhase::Cancelled
        )
    }
}

crate::simple_display! {
    HandoffPhase {
        Initiated => "initiated",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// One handoff from a source agent to a (possibly not-yet-known) target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub source_agent: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<AgentId>,
    #[serde(default)]
    pub tasks_to_transfer: Vec<String>,
    pub phase: HandoffPhase,
    pub reason: String,
    pub initiated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Historical record of one phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffTransition {
    pub timestamp: DateTime<Utc>,
    pub source_agent: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<AgentId>,
    pub phase: HandoffPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Durable state of the handoff manager, persisted to
/// `handoff-state.json` so a restarted manager resumes from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandoffState {
    /// Source agent → active handoff
    #[serde(default)]
    pub active: HashMap<AgentId, HandoffRecord>,
    /// Every phase transition ever recorded, in emission order
    #[serde(default)]
    pub history: Vec<HandoffTransition>,
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
