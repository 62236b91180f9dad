// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable handoff-manager state.
//!
//! `handoff-state.json` holds the active handoffs and the full phase
//! history so a restarted manager resumes exactly where it left off.

use crate::error::StorageError;
use crate::fsio::{read_json_opt, write_json_atomic, FileLock};
use cpost_core::HandoffState;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HandoffStateStore {
    path: PathBuf,
}

impl HandoffStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted state; default-empty when absent.
    pub fn load(&self) -> Result<HandoffState, StorageError> {
        Ok(read_json_opt(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, state: &HandoffState) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        write_json_atomic(&self.path, state)
    }
}

#[cfg(test)]
#[path = "handoff_state_tests.rs"]
mod tests;
