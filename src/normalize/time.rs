// src/normalize/time.rs
// Resolves the feeds' inconsistent time encodings into an instant anchored to
// the reference timezone, and classifies it as timed vs. all-day.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::event::DayKind;

/// A raw time value as it appears in a feed record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawTime<'a> {
    /// `YYYY-MM-DD HH:MM:SS` or bare `YYYY-MM-DD`, wall-clock time already in
    /// the reference timezone (the macro-indicator feed).
    Text(&'a str),
    /// UNIX seconds (the macro-data and report feeds).
    UnixSeconds(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub start: DateTime<Tz>,
    pub day_kind: DayKind,
}

/// Resolve a raw time value into the reference timezone. `None` means the
/// record should be skipped; the caller logs and moves on, never aborts.
pub fn resolve(raw: RawTime<'_>, tz: Tz) -> Option<Resolved> {
    let start = match raw {
        RawTime::Text(s) => resolve_text(s, tz)?,
        RawTime::UnixSeconds(secs) => tz.timestamp_opt(secs, 0).single()?,
    };
    Some(Resolved {
        day_kind: classify(&start),
        start,
    })
}

fn resolve_text(s: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    // DST gaps/folds don't exist in Asia/Shanghai today, but resolve
    // ambiguity deterministically anyway.
    tz.from_local_datetime(&naive).earliest()
}

/// All-day classification:
/// - exact midnight means a date-only event;
/// - a minute outside {0, 15, 30, 45} is presumed to be a "date known, time
///   unknown" placeholder and is demoted to a pending all-day event.
///
/// The second rule intentionally mirrors upstream behavior even though it can
/// misclassify a genuinely time-precise event with an uncommon minute.
fn classify(dt: &DateTime<Tz>) -> DayKind {
    let is_midnight = dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0;
    if is_midnight {
        return DayKind::AllDay;
    }
    if !matches!(dt.minute(), 0 | 15 | 30 | 45) {
        return DayKind::AllDayPending;
    }
    DayKind::Timed
}
