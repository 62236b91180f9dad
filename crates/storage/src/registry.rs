// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable agent registry.
//!
//! A single JSON document `agent-registry.json` holding every agent ever
//! spawned. Entries are created on spawn and mutated (status, handoff
//! count) but never deleted; post-mortems need the full roster.

use crate::error::StorageError;
use crate::fsio::{read_json_opt, write_json_atomic, FileLock};
use cpost_core::{AgentId, AgentStatus, RegistryEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    agents: HashMap<AgentId, RegistryEntry>,
}

/// Store over `agent-registry.json`.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    path: PathBuf,
}

impl AgentRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the whole roster; empty if the file is absent.
    pub fn load(&self) -> Result<HashMap<AgentId, RegistryEntry>, StorageError> {
        Ok(read_json_opt::<RegistryFile>(&self.path)?
            .unwrap_or_default()
            .agents)
    }

    pub fn get(&self, agent: &AgentId) -> Result<Option<RegistryEntry>, StorageError> {
        Ok(self.load()?.remove(agent))
    }

    /// Locked read-modify-write over the roster.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut HashMap<AgentId, RegistryEntry>) -> T,
    ) -> Result<T, StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        let mut file = read_json_opt::<RegistryFile>(&self.path)?.unwrap_or_default();
        let out = f(&mut file.agents);
        write_json_atomic(&self.path, &file)?;
        Ok(out)
    }

    /// Insert or replace one entry.
    pub fn upsert(&self, agent: AgentId, entry: RegistryEntry) -> Result<(), StorageError> {
        self.update(|agents| {
            agents.insert(agent, entry);
        })
    }

    /// Set one agent's status; `NotFound` when unregistered.
    pub fn set_status(&self, agent: &AgentId, status: AgentStatus) -> Result<(), StorageError> {
        self.update(|agents| match agents.get_mut(agent) {
            Some(entry) => {
                entry.status = status;
                Ok(())
            }
            None => Err(StorageError::not_found("agent", agent.as_str())),
        })?
    }

    /// Increment an agent's handoff counter, returning the new value.
    pub fn increment_handoff(&self, agent: &AgentId) -> Result<u32, StorageError> {
        self.update(|agents| match agents.get_mut(agent) {
            Some(entry) => {
                entry.handoff_count += 1;
                Ok(entry.handoff_count)
            }
            None => Err(StorageError::not_found("agent", agent.as_str())),
        })?
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
