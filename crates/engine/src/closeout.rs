// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closeout manager.
//!
//! Runs at the tier-5→6 boundary and never returns an error: every
//! failure is collected into the result struct and the flow continues
//! with whatever it has. Writer and auditor agents answer through
//! one-shot channels raced against their deadlines; a timeout resolves
//! the wait with the programmatic fallback.

use crate::report;
use crate::spec_doc;
use cpost_core::{
    Clock, Event, EventType, Message, MessageId, MessageType, Priority, SupervisorConfig,
};
use cpost_storage::{write_atomic, EventLog, MailboxStore, StateDir};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

const WRITER_AGENT: &str = "closeout-writer";
const AUDITOR_AGENT: &str = "closeout-auditor";
const SENDER: &str = "closeout-manager";

/// Auditor's verdict on the build report. Unknown labels normalize to
/// approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditorVerdict {
    Approved,
    ApprovedWithNotes,
    RevisionNeeded,
    Timeout,
    Skipped,
}

impl AuditorVerdict {
    pub fn parse(label: &str) -> Self {
        match label {
            "approved" => AuditorVerdict::Approved,
            "approved_with_notes" => AuditorVerdict::ApprovedWithNotes,
            "revision_needed" => AuditorVerdict::RevisionNeeded,
            "timeout" => AuditorVerdict::Timeout,
            "skipped" => AuditorVerdict::Skipped,
            _ => AuditorVerdict::Approved,
        }
    }
}

cpost_core::simple_display! {
    AuditorVerdict {
        Approved => "approved",
        ApprovedWithNotes => "approved_with_notes",
        RevisionNeeded => "revision_needed",
        Timeout => "timeout",
        Skipped => "skipped",
    }
}

/// Outcome of the closeout flow; `errors` holds every non-fatal
/// problem encountered along the way.
#[derive(Debug, Clone)]
pub struct CloseoutResult {
    pub success: bool,
    pub actuals_written: bool,
    pub report_written: bool,
    pub auditor_verdict: AuditorVerdict,
    pub errors: Vec<String>,
}

type AuditorAnswer = (String, Option<String>);

pub struct CloseoutManager<C: Clock> {
    state: StateDir,
    mailboxes: MailboxStore,
    events: EventLog,
    config: SupervisorConfig,
    clock: C,
    writer_tx: Mutex<Option<oneshot::Sender<String>>>,
    auditor_tx: Mutex<Option<oneshot::Sender<AuditorAnswer>>>,
}

impl<C: Clock> CloseoutManager<C> {
    pub fn new(
        state: StateDir,
        mailboxes: MailboxStore,
        events: EventLog,
        config: SupervisorConfig,
        clock: C,
    ) -> Self {
        Self {
            state,
            mailboxes,
            events,
            config,
            clock,
            writer_tx: Mutex::new(None),
            auditor_tx: Mutex::new(None),
        }
    }

    /// The writer agent delivered its `actuals_markdown`.
    pub fn handle_writer_response(&self, actuals_markdown: String) {
        if let Some(tx) = self.writer_tx.lock().take() {
            let _ = tx.send(actuals_markdown);
        }
    }

    /// The auditor agent delivered a verdict (and maybe corrections).
    pub fn handle_auditor_response(&self, verdict: &str, corrections: Option<String>) {
        if let Some(tx) = self.auditor_tx.lock().take() {
            let _ = tx.send((verdict.to_string(), corrections));
        }
    }

    /// Run the whole closeout. Never fails — inspect the result.
    pub async fn run(&self) -> CloseoutResult {
        let mut result = CloseoutResult {
            success: false,
            actuals_written: false,
            report_written: false,
            auditor_verdict: AuditorVerdict::Skipped,
            errors: Vec::new(),
        };
        self.log(EventType::CloseoutStarted, |e| e);

        // 1. Collect project data, best-effort
        let now = self.clock.now_utc();
        let data = report::collect(&self.state, now);
        result.errors.extend(data.errors.iter().cloned());

        // 2. Deterministic fallback actuals
        let programmatic = report::programmatic_actuals(&data);

        // 3. Writer agent, with timeout fallback
        let actuals = match self.await_writer(&data).await {
            Some(markdown) => markdown,
            None => {
                self.log(EventType::CloseoutWriterTimeout, |e| e);
                result
                    .errors
                    .push("Writer agent timed out — using programmatic fallback".to_string());
                programmatic
            }
        };

        // 4. Inject into the specification document
        match self.inject_into_spec(&actuals, now) {
            Ok(()) => result.actuals_written = true,
            Err(e) => result.errors.push(format!("spec update failed: {e}")),
        }

        // 5. BUILD-REPORT.md
        let report_text = report::render_build_report(&data);
        match write_atomic(&self.state.build_report_path(), report_text.as_bytes()) {
            Ok(()) => result.report_written = true,
            Err(e) => result.errors.push(format!("build report failed: {e}")),
        }

        // 6. Auditor agent
        let (verdict, corrections) = match self.await_auditor().await {
            Some((label, corrections)) => (AuditorVerdict::parse(&label), corrections),
            None => {
                result.errors.push("Auditor agent timed out".to_string());
                (AuditorVerdict::Timeout, None)
            }
        };
        result.auditor_verdict = verdict;
        self.log(EventType::CloseoutAuditorResponded, |e| {
            e.with_field("verdict", verdict.to_string())
        });

        // 7. Apply corrections, non-fatal
        if verdict == AuditorVerdict::RevisionNeeded {
            if let Some(corrections) = corrections {
                if let Err(e) =
                    write_atomic(&self.state.build_report_path(), corrections.as_bytes())
                {
                    result.errors.push(format!("corrections failed: {e}"));
                }
            }
        }

        result.success = result.actuals_written && result.report_written;
        tracing::info!(
            success = result.success,
            verdict = %result.auditor_verdict,
            errors = result.errors.len(),
            "closeout finished"
        );
        result
    }

    async fn await_writer(&self, data: &report::ProjectData) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        *self.writer_tx.lock() = Some(tx);

        if let Err(e) = self.dispatch(WRITER_AGENT, "write_actuals", |m| {
            m.with_field("task_count", data.tasks.len() as u64)
                .with_field("spec_path", data.spec_path.display().to_string())
        }) {
            tracing::warn!(error = %e, "writer dispatch failed");
        }

        let deadline = Duration::from_millis(self.config.writer_timeout_ms);
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(markdown)) => Some(markdown),
            _ => {
                self.writer_tx.lock().take();
                None
            }
        }
    }

    async fn await_auditor(&self) -> Option<AuditorAnswer> {
        let (tx, rx) = oneshot::channel();
        *self.auditor_tx.lock() = Some(tx);

        if let Err(e) = self.dispatch(AUDITOR_AGENT, "audit_build_report", |m| {
            m.with_field(
                "report_path",
                self.state.build_report_path().display().to_string(),
            )
        }) {
            tracing::warn!(error = %e, "auditor dispatch failed");
        }

        let deadline = Duration::from_millis(self.config.auditor_timeout_ms);
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(answer)) => Some(answer),
            _ => {
                self.auditor_tx.lock().take();
                None
            }
        }
    }

    fn inject_into_spec(
        &self,
        actuals: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), crate::error::EngineError> {
        let path = self.state.spec_document();
        let text = std::fs::read_to_string(&path).unwrap_or_default();
        let with_front = spec_doc::update_front_matter(&text, "built", &now.to_rfc3339());
        let with_actuals = spec_doc::inject_actuals(&with_front, actuals);
        write_atomic(&path, with_actuals.as_bytes())?;
        Ok(())
    }

    fn dispatch(
        &self,
        agent: &str,
        action: &str,
        build: impl FnOnce(Message) -> Message,
    ) -> Result<(), cpost_storage::StorageError> {
        let mut message = build(
            Message::new(SENDER, agent, MessageType::TaskAssignment)
                .with_priority(Priority::High)
                .with_field("action", action),
        );
        message.id = MessageId::generate();
        message.timestamp = self.clock.now_utc();
        self.mailboxes.append(&agent.into(), message)
    }

    fn log(&self, event_type: EventType, build: impl FnOnce(Event) -> Event) {
        let event = build(Event::new(event_type, self.clock.now_utc()));
        if let Err(e) = self.events.append(&event) {
            tracing::warn!(error = %e, "failed to log closeout event");
        }
    }
}

#[cfg(test)]
#[path = "closeout_tests.rs"]
mod tests;
