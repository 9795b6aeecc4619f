//! Deadline computation and expiration checks.
//!
//! Deadlines are stored as ISO-8601 UTC strings with millisecond precision
//! (`2222-02-02T00:01:00.000Z`). They are only checked on demand; nothing in
//! this crate sweeps expired sessions in the background.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use tracing::warn;

/// `9999-12-31T23:59:59.999Z`, the latest deadline that still formats as a
/// four-digit year.
const LATEST_DEADLINE_MILLIS: i64 = 253_402_300_799_999;

/// Format an instant as a stored deadline.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored deadline.
///
/// Accepts RFC 3339 plus the ISO-8601 forms without an offset: a full
/// date-time (`2222-02-02T00:01:00.000`) or a bare date (`2222-02-03`, at
/// midnight). Both are read as UTC. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

/// Deadline `ttl` after `now`, formatted for storage.
///
/// Saturates at the latest four-digit-year instant.
pub fn deadline_after(now: DateTime<Utc>, ttl: Duration) -> String {
    let latest = latest_deadline();
    let deadline = TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .filter(|deadline| *deadline <= latest)
        .unwrap_or(latest);
    format_timestamp(deadline)
}

/// Deadline for an optional TTL; `None` means the session never expires.
pub fn deadline_for(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<String> {
    ttl.map(|ttl| deadline_after(now, ttl))
}

/// Whether `now` is strictly past `expire`.
///
/// No deadline never expires. The deadline instant itself is still live. A
/// deadline that [`parse_timestamp`] rejects counts as expired, so the
/// session cache deletes such a record when it is opened.
pub fn is_past(expire: Option<&str>, now: DateTime<Utc>) -> bool {
    match expire {
        None => false,
        Some(raw) => match parse_timestamp(raw) {
            Some(deadline) => now > deadline,
            None => {
                warn!(expire = %raw, "Unparseable session deadline, treating as expired");
                true
            }
        },
    }
}

fn latest_deadline() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(LATEST_DEADLINE_MILLIS).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
