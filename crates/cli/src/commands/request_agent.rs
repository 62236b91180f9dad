// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cpost request-agent` — file a spawn request with the queue.

use crate::exit_error::{ExitError, EXIT_BUDGET};
use clap::Args;
use cpost_core::{AgentId, ConfigFile, SpawnEntryStatus, SpawnRole, SystemClock};
use cpost_engine::SpawnQueue;
use cpost_storage::{AgentRegistry, EventLog, SpawnQueueStore, StateDir, TaskStore};

#[derive(Args)]
pub struct RequestAgentArgs {
    /// Requesting PO's agent id
    #[arg(long)]
    pub requested_by: String,
    #[arg(long)]
    pub domain: String,
    /// worker or audit
    #[arg(long, value_parser = parse_spawn_role)]
    pub role: SpawnRole,
    #[arg(long)]
    pub reason: String,
    /// Task ids that must be approved first
    #[arg(long = "after-task")]
    pub task_dependencies: Vec<String>,
    /// Domains whose progress gates this request
    #[arg(long = "after-domain")]
    pub domain_dependencies: Vec<String>,
    /// Fraction of dependency-domain tasks that must be done (0-1)
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f64,
}

pub fn run(state: &StateDir, args: RequestAgentArgs) -> Result<(), ExitError> {
    let config = ConfigFile::load(&state.config_path())
        .map_err(|e| ExitError::new(crate::exit_error::EXIT_VALIDATION, e.to_string()))?;

    let queue = SpawnQueue::open(
        SpawnQueueStore::new(state.spawn_queue_dir()),
        AgentRegistry::new(state.registry_path()),
        TaskStore::new(state.tasks_dir()),
        config.topology,
        config.supervisor,
        EventLog::new(state.events_path()),
        SystemClock,
    )?;

    let id = queue.enqueue(
        AgentId::new(args.requested_by),
        args.domain,
        args.role,
        args.reason,
        args.task_dependencies,
        args.domain_dependencies,
        args.threshold,
        Vec::new(),
    )?;

    let entry = queue
        .get(&id)
        .ok_or_else(|| ExitError::new(crate::exit_error::EXIT_FAILURE, "entry vanished"))?;
    match entry.status {
        SpawnEntryStatus::Rejected => Err(ExitError::new(
            EXIT_BUDGET,
            entry
                .rejection_reason
                .unwrap_or_else(|| "request rejected".to_string()),
        )),
        status => {
            println!("{id}: {status}");
            Ok(())
        }
    }
}

fn parse_spawn_role(s: &str) -> Result<SpawnRole, String> {
    match s {
        "worker" => Ok(SpawnRole::Worker),
        "audit" => Ok(SpawnRole::Audit),
        other => Err(format!("role must be worker or audit, got {other}")),
    }
}
