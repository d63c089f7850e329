// src/feed/mod.rs
pub mod wscn;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

/// One raw record from an upstream feed, tagged by schema. Produced by a
/// provider, consumed exactly once by the normalizer.
#[derive(Debug, Clone)]
pub enum RawRecord {
    /// `dt_start`/`summary`/`uid` schema (china.json).
    MacroIndicator(MacroIndicatorRecord),
    /// `public_date`/`title`/`country`/`importance` schema (macrodatas API).
    MacroData(MacroDataRecord),
    /// Positional row from the report API; the normalizer pairs it with the
    /// shared `fields` name array.
    Report {
        fields: Arc<Vec<String>>,
        values: Vec<Value>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MacroIndicatorRecord {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub dt_start: Option<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MacroDataRecord {
    /// Numeric upstream; kept as a JSON value so a string id also works.
    #[serde(default)]
    pub id: Option<Value>,
    /// UNIX seconds.
    #[serde(default)]
    pub public_date: Option<i64>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub importance: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub foresight: Option<String>,
}

/// Wrap positional report rows with their shared field-name array. Length
/// validation happens in the normalizer, not here.
pub fn report_rows(fields: Vec<String>, items: Vec<Vec<Value>>) -> Vec<RawRecord> {
    let fields = Arc::new(fields);
    items
        .into_iter()
        .map(|values| RawRecord::Report {
            fields: Arc::clone(&fields),
            values,
        })
        .collect()
}

/// Source of raw feed records. "No data" is an empty batch, not an error.
#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Upstream API envelope
// ---------------------------------------------------------------------------

pub const API_OK: i64 = 20000;

/// `{code, message, data}` wrapper used by the awtmt endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

// ---------------------------------------------------------------------------
// Query windows (current week, Monday..Sunday, in the reference timezone)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    /// Inclusive UNIX-second bounds, 00:00:00 .. 23:59:59 local.
    pub start: i64,
    pub end: i64,
}

/// Monday 00:00:00 through Sunday 23:59:59 of the week containing `now`,
/// as UNIX timestamps.
pub fn current_week_window(now: DateTime<Tz>) -> (i64, i64) {
    let monday = week_monday(now);
    let sunday_end = monday + Duration::days(7) - Duration::seconds(1);
    (monday.timestamp(), sunday_end.timestamp())
}

/// One window per day of the current week; the report feed is queried day by
/// day.
pub fn week_day_windows(now: DateTime<Tz>) -> Vec<DayWindow> {
    let monday = week_monday(now);
    (0..7)
        .map(|i| {
            let day_start = monday + Duration::days(i);
            let day_end = day_start + Duration::days(1) - Duration::seconds(1);
            DayWindow {
                date: day_start.date_naive(),
                start: day_start.timestamp(),
                end: day_end.timestamp(),
            }
        })
        .collect()
}

fn week_monday(now: DateTime<Tz>) -> DateTime<Tz> {
    let days_since_monday = now.weekday().num_days_from_monday() as i64;
    let monday_date = now.date_naive() - Duration::days(days_since_monday);
    local_midnight(now.timezone(), monday_date)
}

/// Local midnight of `date`, or the first valid wall-clock time after it when
/// midnight falls into a DST gap (some timezones spring forward at 00:00).
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight");
    (0..=8)
        .find_map(|step| {
            tz.from_local_datetime(&(midnight + Duration::minutes(30 * step)))
                .earliest()
        })
        // Gaps never span more than a few hours; past the scan, anchor to UTC.
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}
