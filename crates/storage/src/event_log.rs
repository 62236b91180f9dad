// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only system event log.
//!
//! One JSON object per line. Only the writer side is serialized; any
//! number of readers may scan concurrently. Readers skip malformed lines
//! so a torn tail line never poisons reconstruction.

use crate::error::StorageError;
use crate::fsio::FileLock;
use chrono::{DateTime, Utc};
use cpost_core::{AgentId, Event, EventType};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Filters for [`EventLog::query`]; all present filters must match.
#[derive(Debug, Default, Clone)]
pub struct EventQuery {
    pub agent_id: Option<AgentId>,
    pub event_type: Option<EventType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EventQuery {
    fn matches(&self, event: &Event) -> bool {
        self.agent_id
            .as_ref()
            .map_or(true, |a| event.agent_id.as_ref() == Some(a))
            && self.event_type.map_or(true, |t| event.event_type == t)
            && self.since.map_or(true, |s| event.timestamp >= s)
            && self.until.map_or(true, |u| event.timestamp <= u)
    }
}

/// The append-only event stream at `events/events.jsonl`.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one event. Writers serialize on the file lock.
    pub fn append(&self, event: &Event) -> Result<(), StorageError> {
        let line = serde_json::to_string(event).map_err(|e| StorageError::json(&self.path, e))?;

        let _lock = FileLock::acquire(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| StorageError::io(&self.path, e))?;
        file.sync_all().map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }

    /// All parseable events in write order; empty if the log is absent.
    pub fn read_all(&self) -> Result<Vec<Event>, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        Ok(text
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn query(&self, query: &EventQuery) -> Result<Vec<Event>, StorageError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect())
    }

    /// Truncate the log.
    pub fn clear(&self) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
