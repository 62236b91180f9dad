// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cpost status` — roster and kanban summary.

use crate::exit_error::ExitError;
use cpost_core::TaskStatus;
use cpost_storage::{AgentRegistry, StateDir, TaskStore};

pub fn run(state: &StateDir) -> Result<(), ExitError> {
    let roster = AgentRegistry::new(state.registry_path()).load()?;
    let tasks = TaskStore::new(state.tasks_dir()).list()?;

    println!("agents ({}):", roster.len());
    let mut agents: Vec<_> = roster.into_iter().collect();
    agents.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (id, entry) in agents {
        println!(
            "  {id}  {} {} {} handoffs={}",
            entry.role, entry.domain, entry.status, entry.handoff_count
        );
    }

    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    println!("tasks ({}):", tasks.len());
    for status in [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::ReadyForReview,
        TaskStatus::NeedsRevision,
        TaskStatus::Approved,
        TaskStatus::Failed,
    ] {
        let n = count(status);
        if n > 0 {
            println!("  {status}: {n}");
        }
    }
    Ok(())
}
