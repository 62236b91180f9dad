// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context-growth projection.
//!
//! Linear regression over snapshot usage fractions vs. their timestamps,
//! normalized to minutes from the first sample so the arithmetic never
//! multiplies epoch-scale values.

use chrono::{DateTime, Utc};

/// Usage fraction at which a handoff should already be under way.
pub const HANDOFF_THRESHOLD: f64 = 0.80;

/// Projected time to the handoff threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandoffPrediction {
    /// Minutes until usage reaches [`HANDOFF_THRESHOLD`]; infinity when
    /// no growth is observable.
    pub minutes_to_threshold: f64,
    /// 0.3 + 0.1 per sample, capped at 1.0
    pub confidence: f64,
}

/// Estimate minutes until an agent's context usage hits the threshold.
///
/// Fewer than two points, a non-positive slope, or a degenerate time
/// spread all yield infinity.
pub fn predict_handoff(points: &[(DateTime<Utc>, f64)]) -> HandoffPrediction {
    let confidence = (0.3 + 0.1 * points.len() as f64).min(1.0);
    let infinity = HandoffPrediction {
        minutes_to_threshold: f64::INFINITY,
        confidence,
    };

    if points.len() < 2 {
        return infinity;
    }

    let t0 = points[0].0;
    let xs: Vec<f64> = points
        .iter()
        .map(|(t, _)| (*t - t0).num_milliseconds() as f64 / 60_000.0)
        .collect();
    let ys: Vec<f64> = points.iter().map(|(_, p)| *p).collect();

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let denom: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if denom == 0.0 {
        return infinity;
    }
    let numer: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = numer / denom;
    if slope <= 0.0 {
        return infinity;
    }

    // Project from the last sample, not the regression line's own value,
    // so a fresh reading dominates stale history.
    let last_y = ys[ys.len() - 1];
    HandoffPrediction {
        minutes_to_threshold: ((HANDOFF_THRESHOLD - last_y) / slope).max(0.0),
        confidence,
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
