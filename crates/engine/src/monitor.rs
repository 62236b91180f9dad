// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context monitor: liveness and resource supervision.
//!
//! The monitor never reads conversation content. Each cycle it probes
//! every active agent's tmux session, parses the transcript for the
//! newest usage reading, classifies it into a zone, and — in the red
//! zone — opens a replacement flow. Snapshot-request timeouts are
//! checked on the same cadence.

use crate::error::EngineError;
use crate::projection::{predict_handoff, HandoffPrediction};
use crate::replacement::ReplacementCoordinator;
use cpost_adapters::{read_latest_usage, SessionAdapter, TranscriptUsage};
use cpost_core::{
    AgentId, AgentStatus, Clock, ContextUsage, ContextZone, Event, EventType, MemorySnapshot,
    SupervisorConfig,
};
use cpost_storage::{AgentRegistry, EventLog, SnapshotStore};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

pub struct ContextMonitor<S: SessionAdapter, C: Clock> {
    registry: AgentRegistry,
    snapshots: SnapshotStore,
    events: EventLog,
    sessions: Arc<S>,
    coordinator: Arc<ReplacementCoordinator<C>>,
    config: SupervisorConfig,
    clock: C,
}

impl<S: SessionAdapter, C: Clock> ContextMonitor<S, C> {
    pub fn new(
        registry: AgentRegistry,
        snapshots: SnapshotStore,
        events: EventLog,
        sessions: Arc<S>,
        coordinator: Arc<ReplacementCoordinator<C>>,
        config: SupervisorConfig,
        clock: C,
    ) -> Self {
        Self {
            registry,
            snapshots,
            events,
            sessions,
            coordinator,
            config,
            clock,
        }
    }

    /// One monitoring cycle over every active agent.
    pub async fn poll_once(&self) -> Result<(), EngineError> {
        let roster = self.registry.load()?;

        for (agent, entry) in roster {
            if entry.status != AgentStatus::Active {
                continue;
            }

            match self.sessions.is_alive(&entry.tmux_session).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(agent_id = %agent, session = %entry.tmux_session, "session gone");
                    self.registry.set_status(&agent, AgentStatus::Dead)?;
                    let event = Event::new(EventType::ErrorOccurred, self.clock.now_utc())
                        .for_agent(agent.clone())
                        .with_field("severity", "warning")
                        .with_field("reason", "session_dead")
                        .with_field("tmux_session", entry.tmux_session.as_str());
                    self.events.append(&event)?;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(agent_id = %agent, error = %e, "liveness probe failed");
                    continue;
                }
            }

            let Some(path) = &entry.transcript_path else {
                continue;
            };
            let Some(reading) = read_latest_usage(path) else {
                continue;
            };
            self.observe(&agent, reading).await?;
        }

        self.coordinator.poll().await;
        Ok(())
    }

    /// Record a usage reading: metric event, zone handling, red-zone
    /// snapshot request.
    async fn observe(&self, agent: &AgentId, reading: TranscriptUsage) -> Result<(), EngineError> {
        let usage = ContextUsage::new(reading.context_tokens(), self.config.max_context_tokens);
        let zone = ContextZone::classify(usage.percentage, &self.config.thresholds());

        let event = Event::new(EventType::ContextMetric, self.clock.now_utc())
            .for_agent(agent.clone())
            .with_field("tokens", usage.tokens)
            .with_field("percentage", usage.percentage)
            .with_field("output_tokens", reading.output_tokens)
            .with_field("zone", zone.to_string());
        self.events.append(&event)?;

        match zone {
            ContextZone::Green => {}
            ContextZone::Yellow => {
                tracing::warn!(
                    agent_id = %agent,
                    percentage = usage.percentage,
                    "context approaching critical"
                );
                let warning = Event::new(EventType::ErrorOccurred, self.clock.now_utc())
                    .for_agent(agent.clone())
                    .with_field("severity", "warning")
                    .with_field("reason", "context_warning")
                    .with_field("percentage", usage.percentage);
                self.events.append(&warning)?;
            }
            ContextZone::Red => {
                if !self.coordinator.is_replacement_active(agent) {
                    tracing::warn!(
                        agent_id = %agent,
                        percentage = usage.percentage,
                        "context critical, requesting snapshot"
                    );
                    self.coordinator.request_snapshot(
                        agent,
                        format!("context usage at {:.0}%", usage.percentage * 100.0),
                        Some(usage),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Ingestion bridge: convert an externally-observed reading into a
    /// full metric record and a machine snapshot, firing the same zone
    /// handling as the polling path.
    pub async fn ingest_external_usage(
        &self,
        agent: &AgentId,
        reading: TranscriptUsage,
    ) -> Result<(), EngineError> {
        let usage = ContextUsage::new(reading.context_tokens(), self.config.max_context_tokens);
        let snapshot = MemorySnapshot::from_reading(agent.clone(), usage, self.clock.now_utc());
        self.snapshots
            .create(agent, &snapshot, self.clock.now_utc())?;

        let event = Event::new(EventType::ContextSnapshotCreated, self.clock.now_utc())
            .for_agent(agent.clone())
            .with_field("source", "daemon")
            .with_field("snapshot_id", snapshot.snapshot_id.as_str())
            .with_field("percentage", usage.percentage);
        self.events.append(&event)?;

        self.observe(agent, reading).await
    }

    /// Estimate minutes until an agent needs a handoff, from its
    /// snapshot history.
    pub fn predict_handoff(&self, agent: &AgentId) -> Result<HandoffPrediction, EngineError> {
        let docs = self.snapshots.query(agent, None, None)?;
        let points: Vec<(DateTime<Utc>, f64)> = docs
            .iter()
            .filter_map(|doc| {
                let ts = doc
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
                    .with_timezone(&Utc);
                let pct = cpost_storage::snapshot_percentage(doc)?;
                Some((ts, pct))
            })
            .collect();
        Ok(predict_handoff(&points))
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
