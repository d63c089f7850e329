// src/normalize/title_hint.rs
// The macro-indicator feed smuggles a second, often more precise, time into
// the free-text summary ("20:30 美国2月零售销售环比" or "待定 ..."). Split it
// off so the display title is clean and the hint can correct the feed-level
// timestamp.

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::warn;

/// Feed marker for "time not yet announced".
pub const PENDING_MARKER: &str = "待定";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeHint {
    /// `HH:MM` captured from the head of the summary (kept verbatim).
    Clock(String),
    Pending,
}

/// Split an optional leading time hint from a summary.
/// Returns the hint (if any) and the remaining display title.
pub fn extract(text: &str) -> (Option<TimeHint>, &str) {
    static RE_CLOCK: OnceCell<Regex> = OnceCell::new();
    let re = RE_CLOCK.get_or_init(|| Regex::new(r"^(\d{1,2}:\d{2})\s+(.*)$").unwrap());

    if let Some(caps) = re.captures(text) {
        let clock = caps.get(1).map(|m| m.as_str().to_string());
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if let Some(clock) = clock {
            return (Some(TimeHint::Clock(clock)), rest);
        }
    }

    if let Some(rest) = text.strip_prefix(PENDING_MARKER) {
        if let Some(rest) = rest.strip_prefix(' ') {
            return (Some(TimeHint::Pending), rest);
        }
    }

    (None, text)
}

/// Apply a clock hint to an already-resolved instant: the hint's hour/minute
/// replace the time-of-day, the date stays. An unusable hint keeps the
/// original instant (warned, never raised).
pub fn apply_clock_hint(start: DateTime<Tz>, clock: &str) -> DateTime<Tz> {
    let parsed = clock.split_once(':').and_then(|(h, m)| {
        let h: u32 = h.parse().ok()?;
        let m: u32 = m.parse().ok()?;
        start.with_hour(h)?.with_minute(m)?.with_second(0)
    });
    match parsed {
        Some(dt) => dt,
        None => {
            warn!(hint = clock, "unusable time hint, keeping feed timestamp");
            start
        }
    }
}
