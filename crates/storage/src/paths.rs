// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout under the project root.
//!
//! Everything the core owns lives in `<project>/.command-post/`; the
//! specification document sits beside it at the project root.

use cpost_core::AgentId;
use std::path::{Path, PathBuf};

/// Resolved layout of one project's state directory.
#[derive(Debug, Clone)]
pub struct StateDir {
    project_root: PathBuf,
    root: PathBuf,
}

impl StateDir {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let root = project_root.join(".command-post");
        Self { project_root, root }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn agent_dir(&self, agent: &AgentId) -> PathBuf {
        self.agents_dir().join(agent.as_str())
    }

    pub fn instructions_path(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("INSTRUCTIONS.md")
    }

    pub fn messages_dir(&self) -> PathBuf {
        self.root.join("messages")
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join("events").join("events.jsonl")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("memory-snapshots")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join("agent-registry.json")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn handoff_state_path(&self) -> PathBuf {
        self.root.join("handoff-state.json")
    }

    pub fn spawn_requests_dir(&self) -> PathBuf {
        self.root.join("spawn-requests")
    }

    pub fn spawn_queue_dir(&self) -> PathBuf {
        self.root.join("spawn-queue")
    }

    pub fn status_cache_path(&self) -> PathBuf {
        self.root.join("task-status-cache.json")
    }

    pub fn cascade_state_path(&self) -> PathBuf {
        self.root.join("cascade-state.json")
    }

    pub fn findings_path(&self) -> PathBuf {
        self.root.join("findings.json")
    }

    pub fn completed_flows_dir(&self) -> PathBuf {
        self.root.join("completed-flows")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.project_root.join("output")
    }

    pub fn build_report_path(&self) -> PathBuf {
        self.output_dir().join("BUILD-REPORT.md")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// The specification document, preferring `PRD.md` over
    /// `COMMAND-POST.md`. Returns the preferred path even when neither
    /// exists yet.
    pub fn spec_document(&self) -> PathBuf {
        let prd = self.project_root.join("PRD.md");
        if prd.exists() {
            return prd;
        }
        let alt = self.project_root.join("COMMAND-POST.md");
        if alt.exists() {
            alt
        } else {
            prd
        }
    }
}
