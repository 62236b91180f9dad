// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closeout data collection and report rendering.
//!
//! Collection is best-effort everywhere: malformed task files, a
//! missing event log, or an empty output tree degrade the report, never
//! abort it. Collection problems are recorded in `ProjectData::errors`.

use chrono::{DateTime, Utc};
use cpost_core::{format_elapsed_ms, AgentId, Event, RegistryEntry, Task, TaskStatus};
use cpost_storage::{AgentRegistry, EventLog, StateDir, TaskStore};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One file under `output/`.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Path relative to the output directory
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<std::time::SystemTime>,
}

/// Everything the closeout flow knows about the finished project.
#[derive(Debug, Clone)]
pub struct ProjectData {
    pub project_name: String,
    pub tasks: Vec<Task>,
    pub events: Vec<Event>,
    pub agents: HashMap<AgentId, RegistryEntry>,
    pub output_files: Vec<FileInfo>,
    pub spec_path: PathBuf,
    pub total_duration_ms: u64,
    pub errors: Vec<String>,
}

/// Gather project data from disk. Never fails; problems land in
/// `errors`.
pub fn collect(state: &StateDir, now: DateTime<Utc>) -> ProjectData {
    let mut errors = Vec::new();

    let tasks = match TaskStore::new(state.tasks_dir()).list() {
        Ok(tasks) => tasks,
        Err(e) => {
            errors.push(format!("task scan failed: {e}"));
            Vec::new()
        }
    };
    let events = match EventLog::new(state.events_path()).read_all() {
        Ok(events) => events,
        Err(e) => {
            errors.push(format!("event scan failed: {e}"));
            Vec::new()
        }
    };
    let agents = match AgentRegistry::new(state.registry_path()).load() {
        Ok(agents) => agents,
        Err(e) => {
            errors.push(format!("registry load failed: {e}"));
            HashMap::new()
        }
    };

    let mut output_files = Vec::new();
    walk_output(&state.output_dir(), &state.output_dir(), &mut output_files);
    output_files.sort_by(|a, b| a.path.cmp(&b.path));

    let total_duration_ms = match (events.first(), events.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp)
            .num_milliseconds()
            .max(0) as u64,
        (Some(first), None) => (now - first.timestamp).num_milliseconds().max(0) as u64,
        _ => 0,
    };

    let project_name = state
        .project_root()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    ProjectData {
        project_name,
        tasks,
        events,
        agents,
        output_files,
        spec_path: state.spec_document(),
        total_duration_ms,
        errors,
    }
}

fn walk_output(root: &Path, dir: &Path, out: &mut Vec<FileInfo>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            walk_output(root, &path, out);
        } else if let Ok(meta) = entry.metadata() {
            out.push(FileInfo {
                path: path.strip_prefix(root).unwrap_or(&path).to_path_buf(),
                size: meta.len(),
                modified: meta.modified().ok(),
            });
        }
    }
}

/// The deterministic "Actuals" section, derived entirely from disk.
pub fn programmatic_actuals(data: &ProjectData) -> String {
    let mut out = String::from("## Actuals\n\n### Completed Features\n");
    let completed: Vec<&Task> = data
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Approved)
        .collect();
    if completed.is_empty() {
        out.push_str("- (None)\n");
    }
    for task in &completed {
        let _ = writeln!(out, "- {}: {}", task.feature, task.title);
    }

    out.push_str("\n### Deferred Features\n");
    let mut any_deferred = false;
    for task in &data.tasks {
        let note = match task.status {
            TaskStatus::Pending => "not started",
            TaskStatus::Blocked => "blocked by dependencies",
            TaskStatus::Failed => "failed during build",
            _ => continue,
        };
        any_deferred = true;
        let _ = writeln!(out, "- {}: {} ({note})", task.feature, task.title);
    }
    if !any_deferred {
        out.push_str("- (None)\n");
    }

    out.push_str("\n### Lessons Learned\n");
    let failed = data
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .count();
    let handoffs: u32 = data.tasks.iter().map(|t| t.context.handoff_count).sum();
    let low_compliance = data
        .tasks
        .iter()
        .filter(|t| t.audit.compliance_score.is_some_and(|s| s < 0.7))
        .count();

    let mut lessons = Vec::new();
    if failed > 0 {
        lessons.push(format!("{failed} task(s) failed and were not recovered"));
    }
    if handoffs > 0 {
        lessons.push(format!(
            "{handoffs} context handoff(s) were needed to finish the work"
        ));
    }
    if low_compliance > 0 {
        lessons.push(format!(
            "{low_compliance} task(s) passed review below the 0.7 compliance bar"
        ));
    }
    if data.total_duration_ms > 0 || !data.agents.is_empty() {
        lessons.push(format!(
            "build ran {} across {} agent(s)",
            format_elapsed_ms(data.total_duration_ms),
            data.agents.len()
        ));
    }
    if lessons.is_empty() {
        out.push_str("- (None yet)\n");
    }
    for lesson in lessons {
        let _ = writeln!(out, "- {lesson}");
    }
    out
}

/// Render BUILD-REPORT.md.
pub fn render_build_report(data: &ProjectData) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Build Report: {}", data.project_name);
    let _ = writeln!(out);
    let _ = writeln!(out, "Duration: {}", format_elapsed_ms(data.total_duration_ms));
    let _ = writeln!(out);

    // Summary counts
    let count = |f: &dyn Fn(&Task) -> bool| data.tasks.iter().filter(|t| f(t)).count();
    let completed = count(&|t| t.status == TaskStatus::Approved);
    let failed = count(&|t| t.status == TaskStatus::Failed);
    let in_progress = count(&|t| {
        matches!(
            t.status,
            TaskStatus::InProgress | TaskStatus::ReadyForReview | TaskStatus::NeedsRevision
        )
    });
    let deferred = count(&|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Blocked));

    out.push_str("## Task Summary\n\n");
    out.push_str("| Completed | In Progress | Failed | Deferred | Total |\n");
    out.push_str("|---|---|---|---|---|\n");
    let _ = writeln!(
        out,
        "| {completed} | {in_progress} | {failed} | {deferred} | {} |",
        data.tasks.len()
    );
    out.push('\n');

    out.push_str("## Tasks\n\n");
    out.push_str("| ID | Title | Domain | Status | Assigned To | Compliance |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for task in &data.tasks {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            task.id,
            task.title,
            task.domain,
            task.status,
            task.assigned_to
                .as_ref()
                .map(AgentId::as_str)
                .unwrap_or("-"),
            task.audit
                .compliance_score
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    out.push('\n');

    out.push_str("## Agents\n\n");
    out.push_str("| Agent | Role | Domain | Status | Handoffs |\n");
    out.push_str("|---|---|---|---|---|\n");
    let mut agents: Vec<(&AgentId, &RegistryEntry)> = data.agents.iter().collect();
    agents.sort_by_key(|(id, _)| id.as_str());
    for (id, entry) in agents {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            id, entry.role, entry.domain, entry.status, entry.handoff_count
        );
    }
    out.push('\n');

    out.push_str("## Output Files\n\n");
    if data.output_files.is_empty() {
        out.push_str("- (None)\n");
    } else {
        out.push_str("| File | Size |\n|---|---|\n");
        for file in &data.output_files {
            let _ = writeln!(out, "| {} | {} |", file.path.display(), human_size(file.size));
        }
    }
    out.push('\n');

    out.push_str("## Event Timeline\n\n");
    render_timeline(&mut out, &data.events);
    out
}

/// First five and last five events when the log is long.
fn render_timeline(out: &mut String, events: &[Event]) {
    let line = |out: &mut String, event: &Event| {
        let agent = event
            .agent_id
            .as_ref()
            .map(|a| format!(" ({a})"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "- {} {}{agent}",
            event.timestamp.to_rfc3339(),
            event.event_type
        );
    };

    if events.len() <= 10 {
        for event in events {
            line(out, event);
        }
        return;
    }
    for event in &events[..5] {
        line(out, event);
    }
    let _ = writeln!(out, "- … {} events elided …", events.len() - 10);
    for event in &events[events.len() - 5..] {
        line(out, event);
    }
}

/// Human-readable byte size.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
