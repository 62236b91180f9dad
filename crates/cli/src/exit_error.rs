// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use cpost_engine::EngineError;
use std::fmt;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_VALIDATION: i32 = 2;
pub const EXIT_BUDGET: i32 = 3;
pub const EXIT_TIMEOUT: i32 = 4;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<EngineError> for ExitError {
    fn from(e: EngineError) -> Self {
        let code = match &e {
            EngineError::Validation(_) => EXIT_VALIDATION,
            EngineError::Timeout(_) => EXIT_TIMEOUT,
            _ => EXIT_FAILURE,
        };
        Self::new(code, e.to_string())
    }
}

impl From<cpost_storage::StorageError> for ExitError {
    fn from(e: cpost_storage::StorageError) -> Self {
        let code = match &e {
            cpost_storage::StorageError::Validation(_) => EXIT_VALIDATION,
            _ => EXIT_FAILURE,
        };
        Self::new(code, e.to_string())
    }
}

impl From<anyhow::Error> for ExitError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(EXIT_FAILURE, e.to_string())
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
