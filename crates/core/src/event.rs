// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System event records.
//!
//! Events are the append-only post-mortem trail: one JSON object per line
//! in `events/events.jsonl`, never edited or deleted. State machines do
//! not replay them; they exist for reconstruction and the build report.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::string_id! {
    /// Unique identifier for a logged event (`evt-<uuid>`).
    pub struct EventId("evt-");
}

/// Classification of a system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AgentSpawned,
    AgentShutdown,
    TaskCreated,
    TaskAssigned,
    TaskStatusChanged,
    AuditCompleted,
    MemorySnapshotCreated,
    ContextSnapshotCreated,
    ContextMetric,
    HandoffInitiated,
    HandoffCompleted,
    HandoffFailed,
    ApprovalRequested,
    ApprovalResolved,
    FindingRegistered,
    FindingResolved,
    SpawnRequested,
    CloseoutStarted,
    CloseoutWriterTimeout,
    CloseoutAuditorResponded,
    ProjectComplete,
    ErrorOccurred,
}

crate::simple_display! {
    EventType {
        AgentSpawned => "agent_spawned",
        AgentShutdown => "agent_shutdown",
        TaskCreated => "task_created",
        TaskAssigned => "task_assigned",
        TaskStatusChanged => "task_status_changed",
        AuditCompleted => "audit_completed",
        MemorySnapshotCreated => "memory_snapshot_created",
        ContextSnapshotCreated => "context_snapshot_created",
        ContextMetric => "context_metric",
        HandoffInitiated => "handoff_initiated",
        HandoffCompleted => "handoff_completed",
        HandoffFailed => "handoff_failed",
        ApprovalRequested => "approval_requested",
        ApprovalResolved => "approval_resolved",
        FindingRegistered => "finding_registered",
        FindingResolved => "finding_resolved",
        SpawnRequested => "spawn_requested",
        CloseoutStarted => "closeout_started",
        CloseoutWriterTimeout => "closeout_writer_timeout",
        CloseoutAuditorResponded => "closeout_auditor_responded",
        ProjectComplete => "project_complete",
        ErrorOccurred => "error_occurred",
    }
}

/// One record in the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    pub fn new(event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: EventId::generate(),
            timestamp,
            event_type,
            agent_id: None,
            data: Map::new(),
        }
    }

    pub fn for_agent(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Insert a single data field.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
