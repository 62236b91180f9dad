// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-multiplexer session adapter.
//!
//! Agents run inside named tmux sessions. The core only ever asks to
//! spawn a session, test liveness, inject keystrokes, capture the pane,
//! or kill it — everything else about the agent process is opaque.

mod noop;

pub use noop::NoOpSessionAdapter;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSessionAdapter;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to run tmux: {0}")]
    Spawn(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("tmux command failed for session {session}: {detail}")]
    Command { session: String, detail: String },
}

/// Narrow interface to the terminal multiplexer.
#[async_trait]
pub trait SessionAdapter: Send + Sync + 'static {
    /// Create a detached named session running `command` in `cwd` with
    /// the given environment. Returns once the session exists.
    async fn spawn(
        &self,
        session: &str,
        cwd: &Path,
        command: &str,
        env: &[(String, String)],
    ) -> Result<(), SessionError>;

    /// Synchronous liveness probe: non-zero tmux exit ≡ dead.
    async fn is_alive(&self, session: &str) -> Result<bool, SessionError>;

    /// Inject keystrokes (plus Enter) into the session.
    async fn send(&self, session: &str, input: &str) -> Result<(), SessionError>;

    /// Capture the last `lines` lines of pane output.
    async fn capture_output(&self, session: &str, lines: u32) -> Result<String, SessionError>;

    async fn kill(&self, session: &str) -> Result<(), SessionError>;
}

/// Production adapter shelling out to `tmux`.
#[derive(Debug, Clone, Default)]
pub struct TmuxSessionAdapter;

impl TmuxSessionAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn tmux(args: &[&str]) -> Result<std::process::Output, SessionError> {
        tokio::process::Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| SessionError::Spawn(e.to_string()))
    }
}

#[async_trait]
impl SessionAdapter for TmuxSessionAdapter {
    async fn spawn(
        &self,
        session: &str,
        cwd: &Path,
        command: &str,
        env: &[(String, String)],
    ) -> Result<(), SessionError> {
        let cwd_str = cwd.display().to_string();
        let mut args: Vec<String> = vec![
            "new-session".to_string(),
            "-d".to_string(),
            "-s".to_string(),
            session.to_string(),
            "-c".to_string(),
            cwd_str,
        ];
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(command.to_string());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = Self::tmux(&arg_refs).await?;
        if !output.status.success() {
            return Err(SessionError::Command {
                session: session.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::info!(session = %session, "tmux session created");
        Ok(())
    }

    async fn is_alive(&self, session: &str) -> Result<bool, SessionError> {
        let output = Self::tmux(&["has-session", "-t", session]).await?;
        Ok(output.status.success())
    }

    async fn send(&self, session: &str, input: &str) -> Result<(), SessionError> {
        let output = Self::tmux(&["send-keys", "-t", session, input, "Enter"]).await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(session.to_string()));
        }
        Ok(())
    }

    async fn capture_output(&self, session: &str, lines: u32) -> Result<String, SessionError> {
        let start = format!("-{lines}");
        let output = Self::tmux(&["capture-pane", "-t", session, "-p", "-S", &start]).await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(session.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn kill(&self, session: &str) -> Result<(), SessionError> {
        let output = Self::tmux(&["kill-session", "-t", session]).await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(session.to_string()));
        }
        Ok(())
    }
}
