// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn-queue entry and spawn-request persistence.
//!
//! Queue entries live one-file-per-entry under `spawn-queue/` and are
//! never deleted (terminal entries are the audit trail). Spawn requests
//! under `spawn-requests/` are consumed — deleted — by the session
//! launcher after a successful spawn.

use crate::error::StorageError;
use crate::fsio::{read_json_opt, write_json_atomic};
use cpost_core::{SpawnEntryId, SpawnQueueEntry, SpawnRequest};
use std::fs;
use std::path::PathBuf;

/// Store over the `spawn-queue/` directory.
#[derive(Debug, Clone)]
pub struct SpawnQueueStore {
    dir: PathBuf,
}

impl SpawnQueueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, id: &SpawnEntryId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn save(&self, entry: &SpawnQueueEntry) -> Result<(), StorageError> {
        write_json_atomic(&self.entry_path(&entry.id), entry)
    }

    pub fn get(&self, id: &SpawnEntryId) -> Result<SpawnQueueEntry, StorageError> {
        read_json_opt(&self.entry_path(id))?
            .ok_or_else(|| StorageError::not_found("spawn-queue entry", id.as_str()))
    }

    /// All persisted entries, oldest first. Malformed files are skipped.
    pub fn load_all(&self) -> Result<Vec<SpawnQueueEntry>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };
        let mut out: Vec<SpawnQueueEntry> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|e| read_json_opt::<SpawnQueueEntry>(&e.path()).ok().flatten())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    /// Entries still in flight, for reload on startup.
    pub fn load_non_terminal(&self) -> Result<Vec<SpawnQueueEntry>, StorageError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|e| !e.status.is_terminal())
            .collect())
    }
}

/// Store over the `spawn-requests/` directory.
#[derive(Debug, Clone)]
pub struct SpawnRequestStore {
    dir: PathBuf,
}

impl SpawnRequestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn request_path(&self, request_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", request_id))
    }

    pub fn write(&self, request: &SpawnRequest) -> Result<PathBuf, StorageError> {
        let path = self.request_path(&request.request_id);
        write_json_atomic(&path, request)?;
        Ok(path)
    }

    /// Pending requests, oldest first.
    pub fn list(&self) -> Result<Vec<SpawnRequest>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };
        let mut out: Vec<SpawnRequest> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| read_json_opt::<SpawnRequest>(&e.path()).ok().flatten())
            .collect();
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(out)
    }

    /// Remove a request after the launcher has acted on it.
    pub fn consume(&self, request_id: &str) -> Result<(), StorageError> {
        let path = self.request_path(request_id);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found("spawn request", request_id)
            } else {
                StorageError::io(&path, e)
            }
        })
    }
}

#[cfg(test)]
#[path = "spawn_queue_tests.rs"]
mod tests;
