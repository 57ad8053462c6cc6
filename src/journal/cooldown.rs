//! Cooldown window arithmetic.
//!
//! Everything here works on absolute UTC instants and millisecond differences,
//! never on calendar fields, so day/month/year rollovers need no special cases.

use std::time::Duration;

use chrono::{DateTime, ParseError, SecondsFormat, TimeDelta, Utc};

/// Minimum gap between two consecutive entries of the same user.
pub const COOLDOWN_DURATION: Duration = Duration::from_secs(5 * 60);

const COOLDOWN_MILLIS: i64 = COOLDOWN_DURATION.as_millis() as i64;
const MINUTE_MILLIS: i64 = 60 * 1000;

fn cooldown() -> TimeDelta {
    TimeDelta::milliseconds(COOLDOWN_MILLIS)
}

/// Earliest instant at which a user whose last entry was created at `last_entry` may post again.
pub fn retry_after(last_entry: DateTime<Utc>) -> DateTime<Utc> {
    last_entry + cooldown()
}

/// Whole minutes left until `retry_after`, rounded up. Zero once `now` has reached it.
pub fn minutes_until_retry(retry_after: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let remaining = retry_after - now;
    if remaining <= TimeDelta::zero() {
        return 0;
    }

    let mut millis = remaining.num_milliseconds();
    if remaining > TimeDelta::milliseconds(millis) {
        // sub-millisecond remainder still counts as time left
        millis += 1;
    }

    let minutes = (millis + MINUTE_MILLIS - 1) / MINUTE_MILLIS;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// True iff the two instants are strictly less than [`COOLDOWN_DURATION`] apart.
pub fn within_cooldown(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    (a - b).abs() < cooldown()
}

/// Exclusive bounds of the window around `at` in which another active entry conflicts.
pub fn window_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (at - cooldown(), at + cooldown())
}

/// Canonical storage and wire form: RFC 3339, UTC, millisecond precision, `Z` suffix.
///
/// The width is fixed, so lexicographic order of stored strings is time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc))
}
