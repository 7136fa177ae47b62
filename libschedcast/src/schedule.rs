//! Schedule expression resolution.
//!
//! Turns user-facing schedule expressions into UTC instants. Three
//! grammars are tried in order; the first match wins:
//!
//! 1. Absolute: `2024-03-18 08:00[:30]` (interpreted in the caller's
//!    timezone), optionally with a trailing `+02:00`-style offset or a
//!    `Z` suffix, and full RFC 3339.
//! 2. Relative: `in 2 hours`, `in 1 day`, `in 3 weeks`, `in 10 minutes`.
//! 3. Named day: `tomorrow at 09:00`, `today at 17:30`.
//!
//! An empty expression resolves to `now` (post immediately). `today at`
//! a time that already passed is rejected rather than silently shifted
//! to tomorrow.

use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::ScheduleError;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M%:z",
];

/// Resolve `expression` against `now`, returning the UTC instant the
/// post should become due.
pub fn resolve<Tz: TimeZone>(
    expression: &str,
    now: &DateTime<Tz>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Ok(now.with_timezone(&Utc));
    }

    if let Some(instant) = try_absolute(trimmed, now)? {
        return Ok(instant);
    }
    if let Some(instant) = try_relative(trimmed, now)? {
        return Ok(instant);
    }
    if let Some(instant) = try_named_day(trimmed, now)? {
        return Ok(instant);
    }

    Err(ScheduleError::Unresolvable(trimmed.to_string()))
}

/// Absolute timestamps. A timestamp with an explicit offset is taken as
/// written; a naive one is interpreted in `now`'s timezone.
fn try_absolute<Tz: TimeZone>(
    s: &str,
    now: &DateTime<Tz>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
    }

    // A bare `Z` suffix marks UTC; RFC 3339 parsing only accepts it on
    // the seconds-precision form.
    if let Some(head) = s.strip_suffix(['Z', 'z']) {
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(head, format) {
                return Ok(Some(Utc.from_utc_datetime(&naive)));
            }
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return in_zone(&naive, now).map(Some);
        }
    }

    Ok(None)
}

/// `in <amount> <unit>` with minute/hour/day/week units only. Other
/// humantime units fall through so the expression ends up unresolvable.
fn try_relative<Tz: TimeZone>(
    s: &str,
    now: &DateTime<Tz>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let lower = s.to_lowercase();
    let Some(rest) = lower.strip_prefix("in ") else {
        return Ok(None);
    };

    let mut words = rest.split_whitespace();
    let (Some(amount), Some(unit)) = (words.next(), words.next()) else {
        return Ok(None);
    };
    if words.next().is_some() || amount.parse::<u64>().is_err() {
        return Ok(None);
    }
    if !matches!(
        unit,
        "minute" | "minutes" | "hour" | "hours" | "day" | "days" | "week" | "weeks"
    ) {
        return Ok(None);
    }

    let duration = humantime::parse_duration(&format!("{} {}", amount, unit))
        .map_err(|_| ScheduleError::Unresolvable(s.to_string()))?;
    let delta = chrono::Duration::from_std(duration)
        .map_err(|_| ScheduleError::Unresolvable(s.to_string()))?;

    Ok(Some(now.with_timezone(&Utc) + delta))
}

/// `tomorrow at HH:MM` / `today at HH:MM` in `now`'s timezone.
fn try_named_day<Tz: TimeZone>(
    s: &str,
    now: &DateTime<Tz>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let lower = s.to_lowercase();
    let (day_offset, time_str) = if let Some(rest) = lower.strip_prefix("tomorrow at ") {
        (1, rest.trim())
    } else if let Some(rest) = lower.strip_prefix("today at ") {
        (0, rest.trim())
    } else {
        return Ok(None);
    };

    let time = NaiveTime::parse_from_str(time_str, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time_str, "%H:%M:%S"))
        .map_err(|_| ScheduleError::Unresolvable(s.to_string()))?;

    let date = now
        .date_naive()
        .checked_add_days(Days::new(day_offset))
        .ok_or_else(|| ScheduleError::Unresolvable(s.to_string()))?;
    let instant = in_zone(&date.and_time(time), now)?;

    // Exactly `now` is not past; it resolves and the post is due at once.
    if day_offset == 0 && instant < now.with_timezone(&Utc) {
        return Err(ScheduleError::AlreadyPassed(time_str.to_string()));
    }

    Ok(Some(instant))
}

fn in_zone<Tz: TimeZone>(
    naive: &NaiveDateTime,
    now: &DateTime<Tz>,
) -> Result<DateTime<Utc>, ScheduleError> {
    now.timezone()
        .from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ScheduleError::Unresolvable(naive.to_string()))
}
