// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op session adapter for environments without a multiplexer.

use super::{SessionAdapter, SessionError};
use async_trait::async_trait;
use std::path::Path;

/// Adapter that accepts every operation and reports every session dead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSessionAdapter;

impl NoOpSessionAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionAdapter for NoOpSessionAdapter {
    async fn spawn(
        &self,
        _session: &str,
        _cwd: &Path,
        _command: &str,
        _env: &[(String, String)],
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn is_alive(&self, _session: &str) -> Result<bool, SessionError> {
        Ok(false)
    }

    async fn send(&self, _session: &str, _input: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn capture_output(&self, _session: &str, _lines: u32) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn kill(&self, _session: &str) -> Result<(), SessionError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
