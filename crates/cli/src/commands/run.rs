// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cpost run` — the long-lived supervisor.

use crate::exit_error::ExitError;
use cpost_adapters::TmuxSessionAdapter;
use cpost_core::{ConfigFile, SystemClock};
use cpost_engine::Supervisor;
use cpost_storage::StateDir;
use std::sync::Arc;

pub async fn run(state: &StateDir) -> Result<(), ExitError> {
    let config = ConfigFile::load(&state.config_path())
        .map_err(|e| ExitError::new(crate::exit_error::EXIT_VALIDATION, e.to_string()))?;

    let supervisor = Supervisor::build(
        state.clone(),
        config,
        Arc::new(TmuxSessionAdapter::new()),
        SystemClock,
    )?;
    supervisor.start();
    tracing::info!(root = %state.root().display(), "supervisor running");
    println!("cpost: supervising {}", state.project_root().display());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ExitError::new(crate::exit_error::EXIT_FAILURE, e.to_string()))?;
    supervisor.stop();
    println!("cpost: stopped");
    Ok(())
}
