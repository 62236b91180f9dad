// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context-usage zones.
//!
//! Usage is a fraction of a fixed token budget. The red threshold sits
//! materially below the runtime's auto-compaction cliff so a replacement
//! flow can complete before context is externally truncated.

use serde::{Deserialize, Serialize};

/// Zone classification thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    /// Yellow begins at this fraction
    pub warning: f64,
    /// Red begins at this fraction
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 0.60,
            critical: 0.70,
        }
    }
}

/// Context-usage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextZone {
    Green,
    Yellow,
    Red,
}

impl ContextZone {
    /// Classify a usage fraction: green < warning ≤ yellow < critical ≤ red.
    pub fn classify(percentage: f64, thresholds: &Thresholds) -> Self {
        if percentage >= thresholds.critical {
            ContextZone::Red
        } else if percentage >= thresholds.warning {
            ContextZone::Yellow
        } else {
            ContextZone::Green
        }
    }
}

crate::simple_display! {
    ContextZone {
        Green => "green",
        Yellow => "yellow",
        Red => "red",
    }
}

/// A context-usage reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContextUsage {
    /// Tokens currently occupying the context window
    pub tokens: u64,
    /// Fraction of `max` in use
    pub percentage: f64,
    /// Token budget the fraction is computed against
    pub max: u64,
}

impl ContextUsage {
    pub fn new(tokens: u64, max: u64) -> Self {
        let percentage = if max == 0 {
            0.0
        } else {
            tokens as f64 / max as f64
        };
        Self {
            tokens,
            percentage,
            max,
        }
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod tests;
