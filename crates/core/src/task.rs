// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kanban task records and the status transition graph.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task on the kanban.
///
/// `Approved` and `Failed` are terminal except for explicit reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Blocked,
    ReadyForReview,
    NeedsRevision,
    Approved,
    Failed,
}

impl TaskStatus {
    /// Whether the transition `self → next` is on the restricted graph.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match self {
            Pending => matches!(next, Assigned | Blocked | Failed),
            Assigned => matches!(next, InProgress | Blocked | Pending | Failed),
            InProgress => matches!(next, ReadyForReview | Blocked | Failed),
            Blocked => matches!(next, Pending | Assigned | InProgress | Failed),
            ReadyForReview => matches!(next, Approved | NeedsRevision | Failed),
            NeedsRevision => matches!(next, InProgress | Failed),
            // Explicit reopen paths only
            Approved => matches!(next, InProgress),
            Failed => matches!(next, Pending),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Approved | TaskStatus::Failed)
    }

    /// Statuses a handoff may transfer a task in.
    pub fn is_transferable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned | TaskStatus::InProgress | TaskStatus::Pending | TaskStatus::Blocked
        )
    }

    /// Statuses that satisfy a spawn-queue task dependency.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, TaskStatus::Approved)
    }
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Assigned => "assigned",
        InProgress => "in_progress",
        Blocked => "blocked",
        ReadyForReview => "ready_for_review",
        NeedsRevision => "needs_revision",
        Approved => "approved",
        Failed => "failed",
    }
}

/// Ordered plan steps with a cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPlan {
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub current_step: usize,
}

/// Audit outcome attached by review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskAudit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auditor: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audited_at: Option<DateTime<Utc>>,
}

/// Working context accumulated across handoffs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default)]
    pub handoff_count: u32,
    #[serde(default)]
    pub modified_files: Vec<String>,
    /// Free-form trail of decisions; handoffs append here.
    #[serde(default)]
    pub decision_log: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTimestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A kanban task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub feature: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<AgentId>,
    pub status: TaskStatus,
    #[serde(default)]
    pub plan: TaskPlan,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub audit: TaskAudit,
    #[serde(default)]
    pub context: TaskContext,
    pub timestamps: TaskTimestamps,
}

impl Task {
    pub fn new(id: impl Into<String>, domain: impl Into<String>, now: DateTime<Utc>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            feature: String::new(),
            domain: domain.into(),
            assigned_to: None,
            assigned_by: None,
            status: TaskStatus::Pending,
            plan: TaskPlan::default(),
            dependencies: Vec::new(),
            audit: TaskAudit::default(),
            context: TaskContext::default(),
            timestamps: TaskTimestamps {
                created_at: now,
                updated_at: now,
                completed_at: None,
            },
        }
    }

    /// Apply a status transition, updating timestamps.
    ///
    /// Returns false (and leaves the task untouched) when the transition
    /// is not on the graph.
    pub fn transition(&mut self, next: TaskStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.timestamps.updated_at = now;
        if next.is_terminal() {
            self.timestamps.completed_at = Some(now);
        }
        true
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            id: String = "task-1",
            title: String = "test task",
            feature: String = "core",
            domain: String = "backend",
        }
        set {
            status: TaskStatus = TaskStatus::Pending,
            plan: TaskPlan = TaskPlan::default(),
            dependencies: Vec<String> = Vec::new(),
            audit: TaskAudit = TaskAudit::default(),
            context: TaskContext = TaskContext::default(),
        }
        option {
            assigned_to: AgentId = None,
            assigned_by: AgentId = None,
        }
        computed {
            timestamps: TaskTimestamps = TaskTimestamps {
                created_at: Utc::now(),
                updated_at: Utc::now(),
                completed_at: None,
            },
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
