// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cpost closeout` — run the closeout flow immediately.

use crate::exit_error::ExitError;
use cpost_core::{ConfigFile, SystemClock};
use cpost_engine::CloseoutManager;
use cpost_storage::{EventLog, MailboxStore, StateDir};

pub async fn run(state: &StateDir) -> Result<(), ExitError> {
    let config = ConfigFile::load(&state.config_path())
        .map_err(|e| ExitError::new(crate::exit_error::EXIT_VALIDATION, e.to_string()))?;

    let manager = CloseoutManager::new(
        state.clone(),
        MailboxStore::new(state.messages_dir()),
        EventLog::new(state.events_path()),
        config.supervisor,
        SystemClock,
    );

    let result = manager.run().await;
    println!(
        "closeout: success={} actuals={} report={} verdict={}",
        result.success, result.actuals_written, result.report_written, result.auditor_verdict
    );
    for error in &result.errors {
        println!("  note: {error}");
    }
    if result.success {
        Ok(())
    } else {
        Err(ExitError::new(
            crate::exit_error::EXIT_FAILURE,
            "closeout finished with errors",
        ))
    }
}
