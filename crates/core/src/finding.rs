// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-cutting findings that gate domain shutdown.

use crate::agent::{AgentId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::string_id! {
    /// Unique identifier for a registered finding (`finding-<uuid>`).
    pub struct FindingId("finding-");
}

/// Severity of a finding. Error and critical block their domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Parse a severity label; unknown labels default to warning.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "info" => Severity::Info,
            "warning" => Severity::Warning,
            "error" => Severity::Error,
            "critical" => Severity::Critical,
            _ => Severity::Warning,
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

crate::simple_display! {
    Severity {
        Info => "info",
        Warning => "warning",
        Error => "error",
        Critical => "critical",
    }
}

/// Resolution state; transitions are monotonic
/// (open → in_progress → resolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    InProgress,
    Resolved,
}

impl FindingStatus {
    pub fn can_transition_to(&self, next: FindingStatus) -> bool {
        use FindingStatus::*;
        matches!(
            (self, next),
            (Open, InProgress) | (Open, Resolved) | (InProgress, Resolved)
        )
    }
}

crate::simple_display! {
    FindingStatus {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
    }
}

/// A cross-cutting issue filed by a security/testing/docs agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub domain: String,
    pub source_agent: AgentId,
    pub source_role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub severity: Severity,
    pub category: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub status: FindingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<AgentId>,
    /// Remediation task linked after registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_task: Option<String>,
}

impl Finding {
    /// Open findings at error/critical severity hold their domain's
    /// shutdown.
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking() && self.status != FindingStatus::Resolved
    }
}

#[cfg(test)]
#[path = "finding_tests.rs"]
mod tests;
