// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot quality validation.
//!
//! A snapshot is scored against a weighted checklist; error-severity
//! checks gate validity, warnings and infos only move the score. The
//! full findings list is returned so callers (and the retry message sent
//! back to the agent) can name exactly which check tripped.

use cpost_core::{MemorySnapshot, PrdSnapshot, Task};
use serde::Serialize;

pub const WEIGHT_ERROR: u32 = 3;
pub const WEIGHT_WARNING: u32 = 2;
pub const WEIGHT_INFO: u32 = 1;

/// Severity of a single quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSeverity {
    Error,
    Warning,
    Info,
}

impl CheckSeverity {
    fn weight(self) -> u32 {
        match self {
            CheckSeverity::Error => WEIGHT_ERROR,
            CheckSeverity::Warning => WEIGHT_WARNING,
            CheckSeverity::Info => WEIGHT_INFO,
        }
    }
}

/// One evaluated check, passed or failed.
#[derive(Debug, Clone, Serialize)]
pub struct QualityCheck {
    pub name: &'static str,
    pub severity: CheckSeverity,
    pub passed: bool,
    pub message: String,
}

/// Outcome of scoring a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    /// True iff no error-severity check failed
    pub valid: bool,
    /// Weighted fraction of checks passed, in [0, 1]
    pub score: f64,
    /// Every check evaluated, passed or failed
    pub findings: Vec<QualityCheck>,
    pub passed: usize,
    pub total: usize,
}

impl QualityReport {
    fn from_checks(findings: Vec<QualityCheck>) -> Self {
        let total_weight: u32 = findings.iter().map(|c| c.severity.weight()).sum();
        let passed_weight: u32 = findings
            .iter()
            .filter(|c| c.passed)
            .map(|c| c.severity.weight())
            .sum();
        let passed = findings.iter().filter(|c| c.passed).count();
        let valid = findings
            .iter()
            .all(|c| c.passed || c.severity != CheckSeverity::Error);
        Self {
            valid,
            score: if total_weight == 0 {
                0.0
            } else {
                f64::from(passed_weight) / f64::from(total_weight)
            },
            passed,
            total: findings.len(),
            findings,
        }
    }

    /// Names of failed checks, for the retry message sent to the agent.
    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.findings
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name)
            .collect()
    }
}

fn check(
    name: &'static str,
    severity: CheckSeverity,
    passed: bool,
    message: impl Into<String>,
) -> QualityCheck {
    QualityCheck {
        name,
        severity,
        passed,
        message: message.into(),
    }
}

/// Score a PRD-format snapshot against the eleven-point checklist.
///
/// `task` enables the cross-reference checks; pass the task the snapshot
/// claims to be working on when it is known.
pub fn validate_prd(snapshot: &PrdSnapshot, task: Option<&Task>) -> QualityReport {
    use CheckSeverity::*;
    let mut checks = Vec::with_capacity(11);

    let has_identity = !snapshot.agent_id.as_str().is_empty() && snapshot.task_id.is_some();
    checks.push(check(
        "identification",
        Error,
        has_identity,
        "agent_id and task_id identify the snapshot",
    ));

    checks.push(check(
        "state_populated",
        Error,
        !snapshot.state.is_empty(),
        "state section carries current progress",
    ));

    checks.push(check(
        "next_steps",
        Error,
        !snapshot.next_steps.is_empty(),
        "replacement needs concrete next steps",
    ));

    let decisions_carried = snapshot.handoff_number == 0 || !snapshot.decisions.is_empty();
    checks.push(check(
        "decisions_carried_forward",
        Error,
        decisions_carried,
        "later handoffs must carry the decision trail",
    ));

    let rationale = snapshot.decisions.iter().all(|d| {
        d.rationale
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    });
    checks.push(check(
        "decision_rationale",
        Warning,
        rationale,
        "decisions explain why, not just what",
    ));

    checks.push(check(
        "files_state",
        Warning,
        !snapshot.files_state.is_empty(),
        "file-level progress accounting present",
    ));

    let cross_ref = match task {
        Some(task) if !task.context.modified_files.is_empty() => {
            let snapshot_files: Vec<&String> = snapshot.files_state.all_files().collect();
            task.context
                .modified_files
                .iter()
                .any(|f| snapshot_files.iter().any(|s| *s == f))
        }
        _ => true,
    };
    checks.push(check(
        "files_cross_reference",
        Warning,
        cross_ref,
        "snapshot files overlap the task's modified files",
    ));

    let step_aligned = match (task, &snapshot.state.current_step) {
        (Some(task), Some(step)) if !task.plan.steps.is_empty() => {
            task.plan.steps.iter().any(|s| s == step)
        }
        _ => true,
    };
    checks.push(check(
        "plan_alignment",
        Info,
        step_aligned,
        "current_step appears in the task plan",
    ));

    checks.push(check(
        "gotchas",
        Info,
        !snapshot.gotchas.is_empty(),
        "gotchas documented",
    ));

    let usage_ok = snapshot.context_at_snapshot.is_some_and(|p| p > 0.0);
    checks.push(check(
        "context_usage",
        Info,
        usage_ok,
        "context usage recorded and non-zero",
    ));

    checks.push(check(
        "completion_estimate",
        Info,
        snapshot.state.completion_estimate.is_some(),
        "completion estimate present",
    ));

    QualityReport::from_checks(checks)
}

/// Score a machine-format snapshot against the five-point checklist.
pub fn validate_machine(snapshot: &MemorySnapshot) -> QualityReport {
    use CheckSeverity::*;
    let checks = vec![
        check(
            "required_fields",
            Error,
            !snapshot.agent_id.as_str().is_empty() && !snapshot.snapshot_id.as_str().is_empty(),
            "snapshot_id and agent_id present",
        ),
        check(
            "context_usage",
            Error,
            snapshot.context_usage.tokens > 0 || snapshot.context_usage.percentage > 0.0,
            "context usage is numeric and populated",
        ),
        check(
            "decision_log",
            Warning,
            !snapshot.decision_log.is_empty(),
            "decision log carried",
        ),
        check(
            "task_status",
            Warning,
            snapshot.task_status.is_some(),
            "task status recorded",
        ),
        check(
            "handoff_signal",
            Info,
            snapshot.handoff_signal.is_some(),
            "handoff signal present",
        ),
    ];
    QualityReport::from_checks(checks)
}

#[cfg(test)]
#[path = "quality_tests.rs"]
mod tests;
