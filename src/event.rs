// src/event.rs
// Canonical, feed-agnostic calendar event. Every raw feed record that survives
// normalization becomes one of these; assembly and enrichment never look at
// raw feed fields again.

use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

/// How the event should be rendered on a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayKind {
    /// Concrete start time, rendered with a duration.
    Timed,
    /// True midnight timestamp: date-only event.
    AllDay,
    /// Irregular-minute timestamp: the feed knows the date but not the time.
    /// Rendered date-only with a pending marker in the title.
    AllDayPending,
}

impl DayKind {
    pub fn is_all_day(self) -> bool {
        !matches!(self, DayKind::Timed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Unique within one feed's output; dedup key.
    pub uid: String,
    pub title: String,
    /// Always anchored to the reference timezone, regardless of how the feed
    /// encoded it.
    pub start: DateTime<Tz>,
    pub day_kind: DayKind,
    /// Used only when `day_kind` is `Timed` (30 min for macro indicators,
    /// 2 h for macro data and earnings reports).
    pub duration_minutes: i64,
    /// Structured facts pulled from the raw record (indicator value, unit,
    /// forecast, EPS estimate, ...). Fallback description when enrichment is
    /// unavailable.
    pub raw_description_parts: Vec<String>,
    /// Populated by the enrichment service; `None` until then.
    pub enriched_description: Option<String>,
}

impl Event {
    pub fn end(&self) -> DateTime<Tz> {
        self.start + Duration::minutes(self.duration_minutes)
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Plain description assembled from the structured facts only.
    pub fn basic_description(&self) -> String {
        self.raw_description_parts.join("\n")
    }

    /// What goes into the ICS DESCRIPTION: the enriched text when present,
    /// the structured facts otherwise.
    pub fn description(&self) -> String {
        self.enriched_description
            .clone()
            .unwrap_or_else(|| self.basic_description())
    }
}
