// src/feed/wscn.rs
// HTTP providers for the three WallStreetCN feeds. Each fetch is a plain GET;
// all decision logic lives in the normalizer. Records that fail to
// deserialize are dropped one by one, never the whole batch.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::feed::{
    current_week_window, report_rows, week_day_windows, ApiEnvelope, FeedProvider,
    MacroDataRecord, MacroIndicatorRecord, RawRecord, API_OK,
};

pub const GLOBAL_INDICATOR_URL: &str = "https://ics.wallstreetcn.com/global.json";
pub const MACRO_INDICATOR_URL: &str = "https://ics.wallstreetcn.com/china.json";
pub const MACRO_DATA_URL: &str = "https://api-one-wscn.awtmt.com/apiv1/finance/macrodatas";
pub const REPORT_URL: &str = "https://api-ddc-wscn.awtmt.com/finance/report/list";

/// Countries requested from the report feed.
const REPORT_COUNTRIES: &str = "US,HK,CN";
/// Pause between per-day report requests, to stay under the API rate limit.
const REPORT_FETCH_PAUSE: Duration = Duration::from_millis(500);

const CRATE_USER_AGENT: &str = "wscn-calendar-sync/0.1 (+github.com/wscn-calendar-sync)";
/// The report endpoint 403s requests that don't look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

fn http_client(user_agent: &'static str, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .expect("reqwest client")
}

fn record_or_skip<T: serde::de::DeserializeOwned>(value: Value, feed: &'static str) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(rec) => Some(rec),
        Err(e) => {
            warn!(error = %e, feed, "dropping malformed feed record");
            counter!("calendar_records_skipped_total").increment(1);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Macro-indicator feed (global.json / china.json): a bare JSON array of
// records.
// ---------------------------------------------------------------------------

pub struct MacroIndicatorFeed {
    client: reqwest::Client,
    url: String,
}

impl MacroIndicatorFeed {
    pub fn new(timeout: Duration) -> Self {
        Self::with_url(MACRO_INDICATOR_URL, timeout)
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(CRATE_USER_AGENT, timeout),
            url: url.into(),
        }
    }
}

#[async_trait]
impl FeedProvider for MacroIndicatorFeed {
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let items: Vec<Value> = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("macro-indicator feed get()")?
            .error_for_status()
            .context("macro-indicator feed status")?
            .json()
            .await
            .context("macro-indicator feed json")?;

        let out: Vec<RawRecord> = items
            .into_iter()
            .filter_map(|v| record_or_skip::<MacroIndicatorRecord>(v, "macro-indicator"))
            .map(RawRecord::MacroIndicator)
            .collect();
        counter!("calendar_records_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "macro-indicator"
    }
}

// ---------------------------------------------------------------------------
// Macro-data feed: enveloped, queried for the current week.
// ---------------------------------------------------------------------------

pub struct MacroDataFeed {
    client: reqwest::Client,
    url: String,
    tz: Tz,
}

#[derive(Debug, Default, Deserialize)]
struct MacroDataPayload {
    #[serde(default)]
    items: Vec<Value>,
}

impl MacroDataFeed {
    pub fn new(tz: Tz, timeout: Duration) -> Self {
        Self::with_url(MACRO_DATA_URL, tz, timeout)
    }

    pub fn with_url(url: impl Into<String>, tz: Tz, timeout: Duration) -> Self {
        Self {
            client: http_client(CRATE_USER_AGENT, timeout),
            url: url.into(),
            tz,
        }
    }
}

#[async_trait]
impl FeedProvider for MacroDataFeed {
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let (start, end) = current_week_window(Utc::now().with_timezone(&self.tz));
        info!(start, end, "requesting macro data for the current week");

        let envelope: ApiEnvelope<MacroDataPayload> = self
            .client
            .get(&self.url)
            .query(&[("start", start), ("end", end)])
            .send()
            .await
            .context("macro-data feed get()")?
            .error_for_status()
            .context("macro-data feed status")?
            .json()
            .await
            .context("macro-data feed json")?;

        if envelope.code != API_OK {
            warn!(code = envelope.code, message = %envelope.message, "macro-data feed returned no data");
            return Ok(Vec::new());
        }

        let items = envelope.data.map(|d| d.items).unwrap_or_default();
        let out: Vec<RawRecord> = items
            .into_iter()
            .filter_map(|v| record_or_skip::<MacroDataRecord>(v, "macro-data"))
            .map(RawRecord::MacroData)
            .collect();
        counter!("calendar_records_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "macro-data"
    }
}

// ---------------------------------------------------------------------------
// Report feed: enveloped `fields` + positional `items`, fetched day by day.
// ---------------------------------------------------------------------------

pub struct ReportFeed {
    client: reqwest::Client,
    url: String,
    tz: Tz,
}

#[derive(Debug, Default, Deserialize)]
struct ReportPayload {
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<Value>>,
}

impl ReportFeed {
    pub fn new(tz: Tz, timeout: Duration) -> Self {
        Self::with_url(REPORT_URL, tz, timeout)
    }

    pub fn with_url(url: impl Into<String>, tz: Tz, timeout: Duration) -> Self {
        Self {
            client: http_client(BROWSER_USER_AGENT, timeout),
            url: url.into(),
            tz,
        }
    }

    async fn fetch_day(&self, start: i64, end: i64) -> Result<Vec<RawRecord>> {
        let envelope: ApiEnvelope<ReportPayload> = self
            .client
            .get(&self.url)
            .query(&[
                ("country", REPORT_COUNTRIES.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
            ])
            // The endpoint 403s without browser-like headers.
            .header("Accept", "application/json, text/plain, */*")
            .header("Referer", "https://wallstreetcn.com/")
            .send()
            .await
            .context("report feed get()")?
            .error_for_status()
            .context("report feed status")?
            .json()
            .await
            .context("report feed json")?;

        if envelope.code != API_OK {
            warn!(code = envelope.code, message = %envelope.message, "report feed returned no data");
            return Ok(Vec::new());
        }

        let payload = match envelope.data {
            Some(p) => p,
            None => return Ok(Vec::new()),
        };
        Ok(report_rows(payload.fields, payload.items))
    }
}

#[async_trait]
impl FeedProvider for ReportFeed {
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let mut out = Vec::new();
        let days = week_day_windows(Utc::now().with_timezone(&self.tz));
        for (i, day) in days.iter().enumerate() {
            match self.fetch_day(day.start, day.end).await {
                Ok(mut rows) => {
                    info!(date = %day.date, rows = rows.len(), "fetched report day");
                    out.append(&mut rows);
                }
                Err(e) => {
                    // One bad day doesn't sink the week.
                    warn!(error = ?e, date = %day.date, "report day fetch failed");
                    counter!("calendar_provider_errors_total").increment(1);
                }
            }
            if i + 1 < days.len() {
                tokio::time::sleep(REPORT_FETCH_PAUSE).await;
            }
        }
        counter!("calendar_records_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "report"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The report endpoint rejects non-browser clients with a 403; the other
    // feeds are fine with the crate UA.
    #[test]
    fn report_feed_identifies_as_a_browser() {
        assert!(BROWSER_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(BROWSER_USER_AGENT.contains("Chrome/"));
        assert_ne!(BROWSER_USER_AGENT, CRATE_USER_AGENT);
    }
}
