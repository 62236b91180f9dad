// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replacement agent preparation.
//!
//! Builds the replacement's working directory: the original agent's
//! INSTRUCTIONS.md with a "Memory Handoff Context" section prepended, a
//! `memory_handoff` greeting in the new inbox, and the durable spawn
//! request the session launcher consumes.

use crate::error::EngineError;
use cpost_core::{
    AgentId, Clock, Event, EventType, Message, MessageId, MessageType, PrdSnapshot, Priority,
    SpawnRequest,
};
use cpost_storage::{write_atomic, EventLog, MailboxStore, SpawnRequestStore, StateDir};
use std::fmt::Write as _;

pub struct ReplacementSpawner<C: Clock> {
    state: StateDir,
    mailboxes: MailboxStore,
    requests: SpawnRequestStore,
    events: EventLog,
    clock: C,
}

impl<C: Clock> ReplacementSpawner<C> {
    pub fn new(
        state: StateDir,
        mailboxes: MailboxStore,
        requests: SpawnRequestStore,
        events: EventLog,
        clock: C,
    ) -> Self {
        Self {
            state,
            mailboxes,
            requests,
            events,
            clock,
        }
    }

    /// Replacement id for an original agent at handoff number `n`.
    /// Any prior `-r<k>` suffix is stripped first so depth stays
    /// monotonic.
    pub fn replacement_id(original: &AgentId, handoff_number: u32) -> AgentId {
        original.replacement(handoff_number)
    }

    /// Prepare the replacement's directory and write the spawn request.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        &self,
        original: &AgentId,
        replacement: &AgentId,
        snapshot: &PrdSnapshot,
        handoff_number: u32,
        role: &str,
        domain: &str,
        task_ids: Vec<String>,
    ) -> Result<SpawnRequest, EngineError> {
        // Original instructions seed the replacement; a missing file
        // degrades to the handoff context alone.
        let base = std::fs::read_to_string(self.state.instructions_path(original))
            .unwrap_or_default();
        let prepared = format!(
            "{}\n{}",
            render_handoff_context(snapshot, handoff_number),
            base
        );

        let instructions_path = self.state.instructions_path(replacement);
        write_atomic(&instructions_path, prepared.as_bytes())?;

        let now = self.clock.now_utc();
        let mut greeting = Message::new(
            original.as_str(),
            replacement.as_str(),
            MessageType::MemoryHandoff,
        )
        .with_priority(Priority::High)
        .with_field("event", "replacement_initialized")
        .with_field("handoff_number", handoff_number)
        .with_field(
            "snapshot",
            serde_json::to_value(snapshot).unwrap_or_default(),
        );
        greeting.id = MessageId::generate();
        greeting.timestamp = now;
        self.mailboxes.append(replacement, greeting)?;

        let request = SpawnRequest {
            request_id: format!("req-{}", uuid::Uuid::new_v4()),
            replacement_agent_id: replacement.clone(),
            original_agent_id: original.clone(),
            instructions_path,
            prepared_instructions: prepared,
            snapshot: serde_json::to_value(snapshot).unwrap_or_default(),
            task_ids,
            role: role.to_string(),
            domain: domain.to_string(),
            handoff_number,
            project_path: self.state.project_root().to_path_buf(),
            timestamp: now,
        };
        self.requests.write(&request)?;

        let event = Event::new(EventType::SpawnRequested, now)
            .for_agent(replacement.clone())
            .with_field("original_agent_id", original.as_str())
            .with_field("request_id", request.request_id.as_str());
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log spawn request");
        }

        Ok(request)
    }
}

/// Human-readable dump of a snapshot for the replacement's instructions.
pub fn render_handoff_context(snapshot: &PrdSnapshot, handoff_number: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Memory Handoff Context (Handoff #{handoff_number})");
    let _ = writeln!(out);

    if let Some(summary) = &snapshot.state.progress_summary {
        let _ = writeln!(out, "## Current State");
        let _ = writeln!(out, "{summary}");
        if let Some(step) = &snapshot.state.current_step {
            let _ = writeln!(out, "Current step: {step}");
        }
        if let Some(estimate) = &snapshot.state.completion_estimate {
            let _ = writeln!(out, "Completion estimate: {estimate}");
        }
        let _ = writeln!(out);
    }

    if !snapshot.decisions.is_empty() {
        let _ = writeln!(out, "## Decisions");
        for d in &snapshot.decisions {
            let _ = write!(out, "- {}", d.decision);
            if let Some(rationale) = &d.rationale {
                let _ = write!(out, " — why: {rationale}");
            }
            if let Some(impact) = &d.impact {
                let _ = write!(out, " — impact: {impact}");
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out);
    }

    if !snapshot.gotchas.is_empty() {
        let _ = writeln!(out, "## Gotchas");
        for g in &snapshot.gotchas {
            let _ = writeln!(out, "- {g}");
        }
        let _ = writeln!(out);
    }

    let fs = &snapshot.files_state;
    if !fs.is_empty() {
        let _ = writeln!(out, "## File State");
        for (label, files) in [
            ("Completed", &fs.completed),
            ("In progress", &fs.in_progress),
            ("Not started", &fs.not_started),
        ] {
            for f in files {
                let _ = writeln!(out, "- {label}: {f}");
            }
        }
        let _ = writeln!(out);
    }

    if !snapshot.next_steps.is_empty() {
        let _ = writeln!(out, "## Next Steps");
        for (i, step) in snapshot.next_steps.iter().enumerate() {
            let _ = writeln!(out, "{}. {step}", i + 1);
        }
        let _ = writeln!(out);
    }

    if !snapshot.dependencies_discovered.is_empty() {
        let _ = writeln!(out, "## Dependencies Discovered");
        for d in &snapshot.dependencies_discovered {
            let _ = writeln!(out, "- {d}");
        }
        let _ = writeln!(out);
    }

    out
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
