// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory snapshot store.
//!
//! Write-once, read-many JSON files under `memory-snapshots/`, one per
//! capture, named `<agent>-<safe-timestamp>.json` so lexicographic order
//! is chronological. A companion `<agent>-latest.json` pointer makes the
//! most recent capture an O(1) read. Retention keeps the five newest
//! files and discards anything older than 24 hours; the newest file is
//! always kept so the latest pointer never dangles.

use crate::error::StorageError;
use crate::fsio::{read_json_opt, write_atomic};
use chrono::{DateTime, Duration, Utc};
use cpost_core::{safe_timestamp, AgentId, SnapshotId};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

const RETAIN_COUNT: usize = 5;
const RETAIN_HOURS: i64 = 24;

/// Store over the `memory-snapshots/` directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn latest_path(&self, agent: &AgentId) -> PathBuf {
        self.dir.join(format!("{}-latest.json", agent))
    }

    /// Persist a snapshot document for `agent`.
    ///
    /// Assigns `snapshot_id`, `agent_id`, and `timestamp` envelope fields
    /// when the document lacks them, writes the immutable capture file,
    /// atomically repoints `<agent>-latest.json`, and runs retention.
    pub fn create<T: Serialize>(
        &self,
        agent: &AgentId,
        data: &T,
        now: DateTime<Utc>,
    ) -> Result<SnapshotId, StorageError> {
        let mut doc = serde_json::to_value(data)
            .map_err(|e| StorageError::json(&self.dir.join(agent.as_str()), e))?;
        let id = match doc.get("snapshot_id").and_then(Value::as_str) {
            Some(existing) if !existing.is_empty() => SnapshotId::new(existing),
            _ => SnapshotId::generate(),
        };
        let Some(obj) = doc.as_object_mut() else {
            return Err(StorageError::Validation(
                "snapshot document must be a JSON object".to_string(),
            ));
        };
        obj.insert("snapshot_id".to_string(), Value::String(id.to_string()));
        obj.insert("agent_id".to_string(), Value::String(agent.to_string()));
        obj.entry("timestamp".to_string())
            .or_insert_with(|| Value::String(now.to_rfc3339()));

        // Snapshots are write-once: bump the filename timestamp until free
        let mut ts = now;
        let path = loop {
            let candidate = self
                .dir
                .join(format!("{}-{}.json", agent, safe_timestamp(ts)));
            if !candidate.exists() {
                break candidate;
            }
            ts += Duration::milliseconds(1);
        };

        let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| StorageError::json(&path, e))?;
        write_atomic(&path, &bytes)?;
        write_atomic(&self.latest_path(agent), &bytes)?;

        self.cleanup(agent)?;
        Ok(id)
    }

    /// The most recent snapshot, via the latest pointer; `None` when the
    /// agent has never snapshotted.
    pub fn get_latest(&self, agent: &AgentId) -> Result<Option<Value>, StorageError> {
        read_json_opt(&self.latest_path(agent))
    }

    /// All captures for `agent` in a time range, ascending by timestamp.
    /// Malformed files and the latest pointer are skipped.
    pub fn query(
        &self,
        agent: &AgentId,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, StorageError> {
        let mut docs: Vec<(DateTime<Utc>, Value)> = Vec::new();
        for path in self.capture_files(agent)? {
            let Ok(Some(doc)) = read_json_opt::<Value>(&path) else {
                continue;
            };
            let Some(ts) = doc
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            else {
                continue;
            };
            let ts = ts.with_timezone(&Utc);
            if since.is_some_and(|s| ts < s) || until.is_some_and(|u| ts > u) {
                continue;
            }
            docs.push((ts, doc));
        }
        docs.sort_by_key(|(ts, _)| *ts);
        Ok(docs.into_iter().map(|(_, doc)| doc).collect())
    }

    /// Capture files for one agent, sorted ascending by name
    /// (equivalently, by timestamp). Excludes the latest pointer.
    fn capture_files(&self, agent: &AgentId) -> Result<Vec<PathBuf>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };
        let prefix = format!("{}-", agent);
        let latest = format!("{}-latest.json", agent);
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                name.starts_with(&prefix)
                    && name.ends_with(".json")
                    && name != latest.as_str()
            })
            .map(|e| e.path())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Retention: keep the [`RETAIN_COUNT`] newest captures, and of
    /// those drop any with an mtime older than [`RETAIN_HOURS`] — except
    /// the newest capture, which always survives.
    fn cleanup(&self, agent: &AgentId) -> Result<(), StorageError> {
        let files = self.capture_files(agent)?;
        let Some((_newest, rest)) = files.split_last() else {
            return Ok(());
        };

        // Everything beyond the newest five goes
        let excess = rest.len().saturating_sub(RETAIN_COUNT - 1);
        for path in &rest[..excess] {
            remove_quiet(path);
        }

        // Of the survivors, age out anything past the window
        let cutoff = std::time::SystemTime::now()
            - std::time::Duration::from_secs((RETAIN_HOURS * 3600) as u64);
        for path in &rest[excess..] {
            let too_old = fs::metadata(path)
                .and_then(|m| m.modified())
                .map(|mtime| mtime < cutoff)
                .unwrap_or(false);
            if too_old {
                remove_quiet(path);
            }
        }
        Ok(())
    }
}

fn remove_quiet(path: &PathBuf) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "snapshot cleanup failed");
    }
}

/// Extract the usage fraction from either snapshot flavor: machine-format
/// `context_usage.percentage` or PRD-format `context_at_snapshot`.
pub fn snapshot_percentage(doc: &Value) -> Option<f64> {
    doc.get("context_usage")
        .and_then(|u| u.get("percentage"))
        .and_then(Value::as_f64)
        .or_else(|| doc.get("context_at_snapshot").and_then(Value::as_f64))
}

#[cfg(test)]
#[path = "snapshots_tests.rs"]
mod tests;
