//! Human-readable duration parsing and formatting.
//!
//! Retention checkpoints are configured as strings like `24h` or `7d`: a
//! numeric prefix followed by exactly one unit suffix from `s`, `m`, `h`,
//! `d`, `w`. A checkpoint list is a comma-separated sequence of such strings
//! and must be strictly increasing.

use crate::{Error, Result};
use std::time::Duration;

/// Recognized unit suffixes and their length in seconds.
const UNITS: [(char, u64); 5] = [
    ('s', 1),
    ('m', 60),
    ('h', 60 * 60),
    ('d', 24 * 60 * 60),
    ('w', 7 * 24 * 60 * 60),
];

/// Parses a duration string such as `"24h"` or `"7d"`.
///
/// The input is a non-empty numeric prefix followed by exactly one unit
/// suffix. A bare number is rejected: every checkpoint names its unit.
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`] when the suffix is unrecognized, the
/// numeric part is missing or non-positive, or the string is malformed.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let normalized = value.trim().to_lowercase();

    let invalid = |reason: &str| Error::InvalidDuration {
        input: value.to_string(),
        reason: reason.to_string(),
    };

    let Some(suffix) = normalized.chars().last() else {
        return Err(invalid("duration must not be empty"));
    };

    if suffix.is_ascii_digit() {
        return Err(invalid("missing unit suffix (use one of s, m, h, d, w)"));
    }

    let Some(&(_, unit_seconds)) = UNITS.iter().find(|(c, _)| *c == suffix) else {
        return Err(invalid("unsupported suffix (use one of s, m, h, d, w)"));
    };

    let number_part = &normalized[..normalized.len() - suffix.len_utf8()];
    if number_part.is_empty() {
        return Err(invalid("missing numeric value"));
    }

    let amount: u64 = number_part
        .parse()
        .map_err(|_| invalid("numeric part is not a positive integer"))?;

    if amount == 0 {
        return Err(invalid("duration must be positive"));
    }

    Ok(Duration::from_secs(amount * unit_seconds))
}

/// Parses a comma-separated checkpoint list such as `"3h,24h,7d,30d"`.
///
/// Entries are trimmed and empty entries skipped. An empty or blank input
/// yields an empty list, which the retention planner treats as "keep only
/// the most recent archive".
///
/// # Errors
///
/// Returns [`Error::InvalidCheckpointList`] when any entry fails to parse or
/// the resulting durations are not strictly increasing. Non-increasing or
/// duplicate checkpoints are a configuration error, never silently
/// tolerated.
pub fn parse_checkpoint_list(value: &str) -> Result<Vec<Duration>> {
    let mut durations = Vec::new();

    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let duration = parse_duration(part)
            .map_err(|e| Error::InvalidCheckpointList(format!("entry '{part}': {e}")))?;
        durations.push(duration);
    }

    for pair in durations.windows(2) {
        if pair[1] <= pair[0] {
            return Err(Error::InvalidCheckpointList(
                "checkpoints must be strictly increasing".to_string(),
            ));
        }
    }

    Ok(durations)
}

/// Formats a duration using the largest unit that divides it exactly.
///
/// `Duration::from_secs(86400)` renders as `"1 day"`, `172800` as
/// `"2 days"`. Durations with no exactly-dividing unit fall back to raw
/// seconds.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    const NAMED: [(u64, &str); 5] = [
        (7 * 24 * 60 * 60, "week"),
        (24 * 60 * 60, "day"),
        (60 * 60, "hour"),
        (60, "minute"),
        (1, "second"),
    ];

    let seconds = duration.as_secs();
    for (unit_seconds, label) in NAMED {
        if seconds >= unit_seconds && seconds.is_multiple_of(unit_seconds) {
            let value = seconds / unit_seconds;
            let plural = if value == 1 { "" } else { "s" };
            return format!("{value} {label}{plural}");
        }
    }
    format!("{seconds} seconds")
}
