// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed inbox messages.
//!
//! Messages are the only channel between supervision components and
//! agents. The body is an opaque map — the core never interprets agent
//! content beyond these envelopes.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::string_id! {
    /// Unique identifier for an inbox message (`msg-<uuid>`).
    pub struct MessageId("msg-");
}

/// Kinds of messages agents and supervisors exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskAssignment,
    TaskUpdate,
    AuditReport,
    Feedback,
    PeerMessage,
    LifecycleCommand,
    MemoryHandoff,
    Escalation,
    HumanApprovalRequest,
    HumanApprovalResponse,
}

crate::simple_display! {
    MessageType {
        TaskAssignment => "task_assignment",
        TaskUpdate => "task_update",
        AuditReport => "audit_report",
        Feedback => "feedback",
        PeerMessage => "peer_message",
        LifecycleCommand => "lifecycle_command",
        MemoryHandoff => "memory_handoff",
        Escalation => "escalation",
        HumanApprovalRequest => "human_approval_request",
        HumanApprovalResponse => "human_approval_response",
    }
}

/// Delivery priority. Critical messages are lifecycle-bearing (snapshot
/// requests, shutdown commands, escalations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

crate::simple_display! {
    Priority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Critical => "critical",
    }
}

/// A single inbox message.
///
/// Mutated only for the `read` flag; deleted by the recipient after
/// processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: AgentId,
    pub to: AgentId,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub body: Map<String, Value>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<AgentId>,
}

impl Message {
    /// New unsent message. `id` and `timestamp` are assigned by
    /// `MailboxStore::send`.
    pub fn new(
        from: impl Into<AgentId>,
        to: impl Into<AgentId>,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: MessageId::new(""),
            from: from.into(),
            to: to.into(),
            timestamp: DateTime::<Utc>::MIN_UTC,
            message_type,
            priority: Priority::Normal,
            body: Map::new(),
            read: false,
            cc: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    /// Insert a single body field.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    pub fn with_cc(mut self, cc: Vec<AgentId>) -> Self {
        self.cc = cc;
        self
    }

    /// Read a string field from the body.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
