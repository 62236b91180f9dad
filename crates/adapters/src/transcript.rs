// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript usage parsing.
//!
//! The agent runtime appends a line-delimited JSON record stream. The
//! monitor never reads conversation content — it scans backwards for the
//! most recent `assistant` record with a populated `usage` object and
//! derives the context occupancy from its token counters. Output tokens
//! are tracked but excluded from the occupancy fraction: they do not sit
//! in the context window.

use serde_json::Value;
use std::fs;
use std::path::Path;

/// Token counters from the newest assistant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranscriptUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl TranscriptUsage {
    /// Tokens occupying the context window.
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    /// Occupancy as a fraction of `max_tokens`.
    pub fn percentage(&self, max_tokens: u64) -> f64 {
        if max_tokens == 0 {
            return 0.0;
        }
        self.context_tokens() as f64 / max_tokens as f64
    }
}

/// Scan a transcript backwards for the latest usage reading.
///
/// Malformed lines are skipped silently; an empty or missing file yields
/// no reading.
pub fn read_latest_usage(path: &Path) -> Option<TranscriptUsage> {
    let text = fs::read_to_string(path).ok()?;
    for line in text.lines().rev() {
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if record.get("type").and_then(Value::as_str) != Some("assistant") {
            continue;
        }
        // Usage lives under message.usage in the runtime's format; accept
        // a top-level usage object as well.
        let usage = record
            .get("message")
            .and_then(|m| m.get("usage"))
            .or_else(|| record.get("usage"));
        if let Some(usage) = usage.filter(|u| u.is_object()) {
            return Some(TranscriptUsage {
                input_tokens: count(usage, "input_tokens"),
                output_tokens: count(usage, "output_tokens"),
                cache_creation_tokens: count(usage, "cache_creation_input_tokens"),
                cache_read_tokens: count(usage, "cache_read_input_tokens"),
            });
        }
    }
    None
}

fn count(usage: &Value, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
