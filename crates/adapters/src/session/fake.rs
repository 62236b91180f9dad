// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory session adapter for tests.

use super::{SessionAdapter, SessionError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default)]
struct FakeSessionState {
    /// session name → alive
    sessions: HashMap<String, bool>,
    /// every (session, input) pair sent
    sent: Vec<(String, String)>,
    /// sessions killed, in order
    killed: Vec<String>,
    /// session name → canned pane output
    pane_output: HashMap<String, String>,
}

/// Test adapter with scriptable liveness and recorded interactions.
#[derive(Debug, Clone, Default)]
pub struct FakeSessionAdapter {
    state: Arc<Mutex<FakeSessionState>>,
}

impl FakeSessionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and its liveness.
    pub fn add_session(&self, session: &str, alive: bool) {
        self.state.lock().sessions.insert(session.to_string(), alive);
    }

    /// Flip liveness of an existing session.
    pub fn set_alive(&self, session: &str, alive: bool) {
        self.state.lock().sessions.insert(session.to_string(), alive);
    }

    pub fn set_pane_output(&self, session: &str, output: &str) {
        self.state
            .lock()
            .pane_output
            .insert(session.to_string(), output.to_string());
    }

    /// Inputs sent to a session, in order.
    pub fn sent_to(&self, session: &str) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|(s, _)| s == session)
            .map(|(_, input)| input.clone())
            .collect()
    }

    pub fn killed_sessions(&self) -> Vec<String> {
        self.state.lock().killed.clone()
    }

    pub fn spawned_sessions(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state.sessions.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl SessionAdapter for FakeSessionAdapter {
    async fn spawn(
        &self,
        session: &str,
        _cwd: &Path,
        _command: &str,
        _env: &[(String, String)],
    ) -> Result<(), SessionError> {
        self.state.lock().sessions.insert(session.to_string(), true);
        Ok(())
    }

    async fn is_alive(&self, session: &str) -> Result<bool, SessionError> {
        Ok(*self.state.lock().sessions.get(session).unwrap_or(&false))
    }

    async fn send(&self, session: &str, input: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(session) {
            return Err(SessionError::NotFound(session.to_string()));
        }
        state.sent.push((session.to_string(), input.to_string()));
        Ok(())
    }

    async fn capture_output(&self, session: &str, _lines: u32) -> Result<String, SessionError> {
        let state = self.state.lock();
        state
            .pane_output
            .get(session)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session.to_string()))
    }

    async fn kill(&self, session: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.sessions.insert(session.to_string(), false);
        state.killed.push(session.to_string());
        Ok(())
    }
}
