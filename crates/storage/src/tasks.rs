// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kanban task store: one JSON file per task under `tasks/`.

use crate::error::StorageError;
use crate::fsio::{read_json_opt, write_json_atomic, FileLock};
use chrono::{DateTime, Utc};
use cpost_core::{Task, TaskStatus};
use std::fs;
use std::path::PathBuf;

/// Store over the `tasks/` directory.
#[derive(Debug, Clone)]
pub struct TaskStore {
    dir: PathBuf,
}

impl TaskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn task_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn get(&self, id: &str) -> Result<Task, StorageError> {
        read_json_opt(&self.task_path(id))?
            .ok_or_else(|| StorageError::not_found("task", id))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.task_path(id).exists()
    }

    /// Every parseable task on the kanban. Malformed files are skipped.
    pub fn list(&self) -> Result<Vec<Task>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };
        let mut tasks: Vec<Task> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|e| read_json_opt::<Task>(&e.path()).ok().flatten())
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    /// Persist a task verbatim (no transition check — callers that change
    /// status go through [`TaskStore::transition`]).
    pub fn save(&self, task: &Task) -> Result<(), StorageError> {
        let path = self.task_path(&task.id);
        let _lock = FileLock::acquire(&path)?;
        write_json_atomic(&path, task)
    }

    /// Locked read-modify-write of one task.
    pub fn with_task<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Task) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let path = self.task_path(id);
        let _lock = FileLock::acquire(&path)?;
        let mut task: Task =
            read_json_opt(&path)?.ok_or_else(|| StorageError::not_found("task", id))?;
        let out = f(&mut task)?;
        write_json_atomic(&path, &task)?;
        Ok(out)
    }

    /// Apply a status transition through the restricted graph.
    pub fn transition(
        &self,
        id: &str,
        next: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Task, StorageError> {
        self.with_task(id, |task| {
            let from = task.status;
            if !task.transition(next, now) {
                return Err(StorageError::Validation(format!(
                    "task {} cannot move {} → {}",
                    id, from, next
                )));
            }
            tracing::debug!(task_id = %id, from = %from, to = %next, "task transition");
            Ok(task.clone())
        })
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
