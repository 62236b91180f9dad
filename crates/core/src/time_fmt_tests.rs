// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[test]
fn safe_timestamp_has_no_colons_or_dots() {
    let ts = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
    let safe = safe_timestamp(ts);
    assert!(!safe.contains(':'));
    assert!(!safe.contains('.'));
}

#[test]
fn safe_timestamps_sort_chronologically() {
    let a = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
    let b = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 27).unwrap();
    assert!(safe_timestamp(a) < safe_timestamp(b));
}

#[yare::parameterized(
    seconds = { 38_000, "38s" },
    minutes = { 154_000, "2m 34s" },
    hours   = { 8_040_000, "2h 14m" },
    zero    = { 0, "0s" },
)]
fn format_elapsed(ms: u64, expected: &str) {
    assert_eq!(format_elapsed_ms(ms), expected);
}
