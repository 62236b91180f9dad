// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session launcher: the consumer side of the spawn-request contract.
//!
//! The engine writes a durable spawn-request JSON; something must turn
//! it into a live tmux session carrying the agent metadata. In
//! production that is usually an external process, but the coordinator
//! can also be handed a [`SpawnExecutor`] to launch synchronously.

use crate::session::{SessionAdapter, SessionError};
use async_trait::async_trait;
use cpost_core::SpawnRequest;
use std::sync::Arc;

/// Executes a spawn request, creating the agent's session.
#[async_trait]
pub trait SpawnExecutor: Send + Sync {
    async fn execute(&self, request: &SpawnRequest) -> Result<(), SessionError>;
}

/// Session name for an agent id.
pub fn session_name(agent_id: &str) -> String {
    format!("cp-{agent_id}")
}

/// Launcher backed by a [`SessionAdapter`].
///
/// Creates a detached session named `cp-<agent-id>` in the project root,
/// exporting the agent metadata environment expected by the runtime.
pub struct SessionLauncher<S: SessionAdapter> {
    sessions: Arc<S>,
    /// Command line that starts the agent runtime
    agent_command: String,
    project_name: String,
}

impl<S: SessionAdapter> SessionLauncher<S> {
    pub fn new(
        sessions: Arc<S>,
        agent_command: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            agent_command: agent_command.into(),
            project_name: project_name.into(),
        }
    }
}

#[async_trait]
impl<S: SessionAdapter> SpawnExecutor for SessionLauncher<S> {
    async fn execute(&self, request: &SpawnRequest) -> Result<(), SessionError> {
        let session = session_name(request.replacement_agent_id.as_str());
        let env = vec![
            (
                "AGENT_ID".to_string(),
                request.replacement_agent_id.to_string(),
            ),
            ("AGENT_DOMAIN".to_string(), request.domain.clone()),
            ("AGENT_ROLE".to_string(), request.role.clone()),
            ("PROJECT_NAME".to_string(), self.project_name.clone()),
        ];
        self.sessions
            .spawn(&session, &request.project_path, &self.agent_command, &env)
            .await?;
        tracing::info!(
            agent_id = %request.replacement_agent_id,
            session = %session,
            "replacement session launched"
        );
        Ok(())
    }
}

/// Test executor that records requests and can be scripted to fail.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeSpawnExecutor {
    executed: parking_lot::Mutex<Vec<SpawnRequest>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeSpawnExecutor {
    fn default() -> Self {
        Self {
            executed: parking_lot::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSpawnExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn executed(&self) -> Vec<SpawnRequest> {
        self.executed.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl SpawnExecutor for FakeSpawnExecutor {
    async fn execute(&self, request: &SpawnRequest) -> Result<(), SessionError> {
        if self.fail.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(SessionError::Spawn("scripted failure".to_string()));
        }
        self.executed.lock().push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
