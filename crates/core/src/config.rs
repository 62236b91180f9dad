// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration and project topology.
//!
//! Loaded from `<root>/.command-post/config.toml`; an absent file yields
//! the defaults. Topology names the domains and their owning POs — the
//! live agent population is always read from the registry, never from
//! config.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Tunable supervision parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Context monitor poll cadence
    pub poll_interval_ms: u64,
    /// Red-zone fraction
    pub context_threshold: f64,
    /// Yellow-zone fraction
    pub warning_threshold: f64,
    /// Denominator for usage percentage
    pub max_context_tokens: u64,
    /// Deadline for a snapshot response before re-issue
    pub snapshot_timeout_ms: u64,
    /// Minimum weighted score to accept a snapshot
    pub min_quality_score: f64,
    /// Snapshot retries before force-handoff
    pub max_snapshot_retries: u32,
    /// Closeout writer deadline
    pub writer_timeout_ms: u64,
    /// Closeout auditor deadline
    pub auditor_timeout_ms: u64,
    /// Spawn-queue global budget ceiling
    pub max_agents: usize,
    /// Spawn-queue per-domain ceiling (unbounded when absent)
    pub max_per_domain: Option<usize>,
    /// Task completion monitor cadence
    pub task_completion_poll_interval_ms: u64,
    /// Whether worker→worker peer messages are permitted
    pub lateral_messaging_enabled: bool,
    /// CC the orchestrator on lateral messages
    pub cc_orchestrator: bool,
    /// Compliance score at or above which audits auto-approve
    pub audit_approval_threshold: f64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            context_threshold: 0.70,
            warning_threshold: 0.60,
            max_context_tokens: 200_000,
            snapshot_timeout_ms: 300_000,
            min_quality_score: 0.6,
            max_snapshot_retries: 3,
            writer_timeout_ms: 600_000,
            auditor_timeout_ms: 300_000,
            max_agents: 25,
            max_per_domain: None,
            task_completion_poll_interval_ms: 30_000,
            lateral_messaging_enabled: true,
            cc_orchestrator: false,
            audit_approval_threshold: 0.7,
        }
    }
}

impl SupervisorConfig {
    /// Zone thresholds derived from the configured fractions.
    pub fn thresholds(&self) -> crate::zone::Thresholds {
        crate::zone::Thresholds {
            warning: self.warning_threshold,
            critical: self.context_threshold,
        }
    }
}

/// One domain in the project topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSpec {
    /// The PO that owns this domain
    pub po: AgentId,
}

/// Logical partition of the fleet into domains.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub domains: HashMap<String, DomainSpec>,
}

impl Topology {
    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.contains_key(domain)
    }

    pub fn po_of(&self, domain: &str) -> Option<&AgentId> {
        self.domains.get(domain).map(|d| &d.po)
    }
}

/// Top-level config file shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub supervisor: SupervisorConfig,
    pub topology: Topology,
}

impl ConfigFile {
    /// Load from a toml file; an absent file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
