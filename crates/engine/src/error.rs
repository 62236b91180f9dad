// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Periodic monitors catch these at the poll boundary, log them to the
//! event log, and continue; the replacement coordinator converts them
//! into failed flows plus a critical escalation.

use cpost_adapters::SessionError;
use cpost_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Schema or permission violation; the operation was refused with no
    /// side effects.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Invariant violation detected before any state change.
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unrecoverable core state; halts the affected subsystem.
    #[error("fatal: {0}")]
    Fatal(String),
}
