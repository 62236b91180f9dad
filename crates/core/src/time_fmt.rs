// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp formatting helpers.
//!
//! All durable artifacts carry RFC 3339 UTC timestamps so lexicographic
//! order equals chronological order. Snapshot filenames substitute the
//! characters that are unsafe in file names.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn utc_now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a UTC timestamp as RFC 3339 with millisecond precision.
pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Filename-safe variant of an RFC 3339 timestamp.
///
/// Replaces `:` and `.` with `-` so the result is portable while staying
/// lexicographically sortable alongside other safe timestamps.
pub fn safe_timestamp(ts: DateTime<Utc>) -> String {
    rfc3339(ts).replace([':', '.'], "-")
}

/// Human-readable elapsed duration from milliseconds (e.g. "2h 14m", "38s").
pub fn format_elapsed_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
