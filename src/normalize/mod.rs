// src/normalize/mod.rs
// Maps one raw feed record into the canonical Event. All per-record failures
// (unresolvable start, missing required field, row-length mismatch) are
// skips, never errors: partial upstream rows are expected.

pub mod time;
pub mod title_hint;

use std::collections::HashMap;

use chrono_tz::Tz;
use serde_json::Value;
use tracing::{debug, warn};

use crate::event::{DayKind, Event};
use crate::feed::{MacroDataRecord, MacroIndicatorRecord, RawRecord};
use crate::normalize::time::{resolve, RawTime};
use crate::normalize::title_hint::{TimeHint, PENDING_MARKER};

const UNKNOWN_EVENT: &str = "未知事件";
const UNKNOWN_COMPANY: &str = "未知公司";

/// Fixed durations per feed (only used for timed events).
const MACRO_INDICATOR_MINUTES: i64 = 30;
const MACRO_DATA_MINUTES: i64 = 120;
const REPORT_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Reference timezone every instant is anchored to.
    pub tz: Tz,
    /// Country allow-set for the macro-data feed (feed-native names).
    pub countries: Vec<String>,
    /// Required importance level for the macro-data feed.
    pub importance: i64,
}

impl NormalizeConfig {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            countries: vec!["美国".to_string(), "中国".to_string()],
            importance: 3,
        }
    }
}

/// Flag prefix for event titles; the feeds name countries in Chinese, the
/// report feed sometimes in ISO-ish codes.
pub fn country_flag(country: &str) -> &'static str {
    match country {
        "美国" | "US" => "🇺🇸",
        "中国" | "CN" => "🇨🇳",
        "香港" | "HK" => "🇭🇰",
        _ => "🌍",
    }
}

/// Normalize one raw record. `None` means the record is skipped.
pub fn normalize(record: RawRecord, cfg: &NormalizeConfig) -> Option<Event> {
    match record {
        RawRecord::MacroIndicator(rec) => normalize_macro_indicator(rec, cfg),
        RawRecord::MacroData(rec) => normalize_macro_data(rec, cfg),
        RawRecord::Report { fields, values } => normalize_report(&fields, values, cfg),
    }
}

fn normalize_macro_indicator(rec: MacroIndicatorRecord, cfg: &NormalizeConfig) -> Option<Event> {
    if rec.uid.is_empty() {
        debug!("macro-indicator record without uid, skipping");
        return None;
    }
    let dt_start = rec.dt_start.as_deref()?;
    let resolved = match resolve(RawTime::Text(dt_start), cfg.tz) {
        Some(r) => r,
        None => {
            warn!(dt_start, "unparseable macro-indicator start, skipping");
            return None;
        }
    };

    let (hint, remainder) = title_hint::extract(&rec.summary);
    let mut title = if remainder.is_empty() {
        UNKNOWN_EVENT.to_string()
    } else {
        remainder.to_string()
    };

    // A concrete in-title time corrects the coarser feed-level timestamp, but
    // only for events that actually have a time.
    let mut start = resolved.start;
    if let (Some(TimeHint::Clock(clock)), DayKind::Timed) = (&hint, resolved.day_kind) {
        start = title_hint::apply_clock_hint(start, clock);
    }
    if resolved.day_kind == DayKind::AllDayPending {
        title = pending_title(&title);
    }

    Some(Event {
        uid: rec.uid,
        title,
        start,
        day_kind: resolved.day_kind,
        duration_minutes: MACRO_INDICATOR_MINUTES,
        raw_description_parts: vec![
            "华尔街见闻中国日历事件".to_string(),
            format!("原始摘要: {}", rec.summary),
        ],
        enriched_description: None,
    })
}

fn normalize_macro_data(rec: MacroDataRecord, cfg: &NormalizeConfig) -> Option<Event> {
    let public_date = rec.public_date?;

    // Inclusion filter: configured countries at the configured importance
    // level only.
    if !cfg.countries.iter().any(|c| c == &rec.country) || rec.importance != cfg.importance {
        return None;
    }

    let resolved = match resolve(RawTime::UnixSeconds(public_date), cfg.tz) {
        Some(r) => r,
        None => {
            warn!(public_date, "unparseable macro-data timestamp, skipping");
            return None;
        }
    };

    let id = rec.id.as_ref().and_then(value_display)?;
    let base_title = rec
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_EVENT.to_string());
    let mut title = if rec.country.is_empty() {
        base_title
    } else {
        format!("{} {}", country_flag(&rec.country), base_title)
    };
    if resolved.day_kind == DayKind::AllDayPending {
        title = pending_title(&title);
    }

    let mut parts = Vec::new();
    if let Some(event) = rec.event.filter(|e| !e.is_empty()) {
        parts.push(format!("📊 事件详情: {event}"));
    }
    if let (Some(quantity), Some(unit)) = (
        rec.quantity.as_ref().and_then(value_nonzero_display),
        rec.unit.filter(|u| !u.is_empty()),
    ) {
        parts.push(format!("📈 数据: {quantity} {unit}"));
    }
    if let Some(foresight) = rec.foresight.filter(|f| !f.is_empty()) {
        parts.push(format!("🔮 {foresight}"));
    }

    Some(Event {
        uid: format!("{id}_wscn_macro"),
        title,
        start: resolved.start,
        day_kind: resolved.day_kind,
        duration_minutes: MACRO_DATA_MINUTES,
        raw_description_parts: parts,
        enriched_description: None,
    })
}

fn normalize_report(fields: &[String], values: Vec<Value>, cfg: &NormalizeConfig) -> Option<Event> {
    // Positional rows must match the field-name array exactly; mismatched
    // rows are upstream corruption and are skipped.
    if values.len() != fields.len() {
        warn!(
            fields = fields.len(),
            row = values.len(),
            "report row length mismatch, skipping"
        );
        return None;
    }
    let row: HashMap<&str, &Value> = fields
        .iter()
        .map(String::as_str)
        .zip(values.iter())
        .collect();

    let public_date = row.get("public_date").and_then(|v| v.as_i64())?;
    let resolved = match resolve(RawTime::UnixSeconds(public_date), cfg.tz) {
        Some(r) => r,
        None => {
            warn!(public_date, "unparseable report timestamp, skipping");
            return None;
        }
    };

    let id = row.get("id").and_then(|v| value_display(v))?;
    let company_name = row
        .get("company_name")
        .and_then(|v| value_display(v))
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    let code = row.get("code").and_then(|v| value_display(v));
    let country = row
        .get("country")
        .and_then(|v| value_display(v))
        .unwrap_or_default();
    let observation_date = row.get("observation_date").and_then(|v| value_display(v));

    let flag = country_flag(&country);
    let mut title_parts = vec![flag.to_string(), company_name];
    if let Some(code) = code {
        title_parts.push(format!("({code})"));
    }
    if let Some(obs) = observation_date {
        title_parts.push(format!("- {obs}"));
    }
    let mut title = title_parts.join(" ");
    if resolved.day_kind == DayKind::AllDayPending {
        title = pending_title(&title);
    }

    let mut parts = vec![flag.to_string()];
    if let Some(eps) = row.get("eps_estimate").and_then(|v| value_nonzero_display(v)) {
        parts.push(format!("💰 预期EPS: {eps}"));
    }
    if let Some(earnings) = row
        .get("earnings_estimate")
        .and_then(|v| value_nonzero_display(v))
    {
        parts.push(format!("📈 预期收益: {earnings}"));
    }

    Some(Event {
        uid: format!("{id}_wscn_report"),
        title,
        start: resolved.start,
        day_kind: resolved.day_kind,
        duration_minutes: REPORT_MINUTES,
        raw_description_parts: parts,
        enriched_description: None,
    })
}

fn pending_title(title: &str) -> String {
    format!("{title} ({PENDING_MARKER})")
}

/// String/number JSON values as display text; empty strings and other shapes
/// are "absent".
fn value_display(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Like `value_display`, but a numeric zero counts as absent (the feeds use 0
/// as "no estimate").
fn value_nonzero_display(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        _ => value_display(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Shanghai;
    use std::sync::Arc;

    fn cfg() -> NormalizeConfig {
        NormalizeConfig::new(Shanghai)
    }

    fn macro_data(country: &str, importance: i64) -> MacroDataRecord {
        MacroDataRecord {
            id: Some(Value::from(42)),
            public_date: Some(1_742_214_600), // 2025-03-17 20:30 +08
            country: country.to_string(),
            importance,
            title: Some("2月零售销售环比".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn macro_indicator_uses_title_hint_override() {
        let rec = MacroIndicatorRecord {
            uid: "abc".into(),
            dt_start: Some("2025-03-17 20:00:00".into()),
            summary: "20:30 美国2月零售销售环比".into(),
        };
        let ev = normalize(RawRecord::MacroIndicator(rec), &cfg()).unwrap();
        assert_eq!(ev.title, "美国2月零售销售环比");
        assert_eq!(ev.start.format("%H:%M").to_string(), "20:30");
        assert_eq!(ev.duration_minutes, 30);
    }

    #[test]
    fn macro_indicator_midnight_ignores_clock_hint() {
        let rec = MacroIndicatorRecord {
            uid: "abc".into(),
            dt_start: Some("2025-03-17".into()),
            summary: "20:30 美国2月零售销售环比".into(),
        };
        let ev = normalize(RawRecord::MacroIndicator(rec), &cfg()).unwrap();
        assert_eq!(ev.day_kind, DayKind::AllDay);
        assert_eq!(ev.start.format("%H:%M").to_string(), "00:00");
    }

    #[test]
    fn macro_indicator_without_uid_is_skipped() {
        let rec = MacroIndicatorRecord {
            uid: String::new(),
            dt_start: Some("2025-03-17".into()),
            summary: "x".into(),
        };
        assert!(normalize(RawRecord::MacroIndicator(rec), &cfg()).is_none());
    }

    #[test]
    fn macro_data_filter_drops_other_countries_and_levels() {
        assert!(normalize(RawRecord::MacroData(macro_data("德国", 3)), &cfg()).is_none());
        assert!(normalize(RawRecord::MacroData(macro_data("中国", 2)), &cfg()).is_none());
        let ev = normalize(RawRecord::MacroData(macro_data("中国", 3)), &cfg()).unwrap();
        assert_eq!(ev.uid, "42_wscn_macro");
        assert!(ev.title.starts_with("🇨🇳 "));
        assert_eq!(ev.duration_minutes, 120);
    }

    #[test]
    fn macro_data_pending_time_gets_marker() {
        let mut rec = macro_data("美国", 3);
        rec.public_date = Some(1_742_214_600 + 120); // 20:32, irregular minute
        let ev = normalize(RawRecord::MacroData(rec), &cfg()).unwrap();
        assert_eq!(ev.day_kind, DayKind::AllDayPending);
        assert!(ev.title.ends_with("(待定)"), "title: {}", ev.title);
    }

    #[test]
    fn macro_data_zero_quantity_is_omitted() {
        let mut rec = macro_data("美国", 3);
        rec.event = Some("CPI".into());
        rec.quantity = Some(Value::from(0));
        rec.unit = Some("%".into());
        let ev = normalize(RawRecord::MacroData(rec), &cfg()).unwrap();
        assert_eq!(ev.raw_description_parts, vec!["📊 事件详情: CPI".to_string()]);
    }

    #[test]
    fn report_row_is_reconstructed_from_fields() {
        let fields = Arc::new(vec![
            "id".to_string(),
            "public_date".to_string(),
            "company_name".to_string(),
            "code".to_string(),
            "country".to_string(),
            "observation_date".to_string(),
            "eps_estimate".to_string(),
        ]);
        let values = vec![
            Value::from(7),
            Value::from(1_742_214_600),
            Value::from("苹果"),
            Value::from("AAPL"),
            Value::from("US"),
            Value::from("2025Q1"),
            Value::from(2.35),
        ];
        let ev = normalize(
            RawRecord::Report {
                fields,
                values,
            },
            &cfg(),
        )
        .unwrap();
        assert_eq!(ev.uid, "7_wscn_report");
        assert_eq!(ev.title, "🇺🇸 苹果 (AAPL) - 2025Q1");
        assert!(ev
            .raw_description_parts
            .contains(&"💰 预期EPS: 2.35".to_string()));
    }

    #[test]
    fn report_row_length_mismatch_is_skipped() {
        let fields = Arc::new(vec!["id".to_string(), "country".to_string()]);
        let ok = RawRecord::Report {
            fields: Arc::clone(&fields),
            values: vec![Value::from(1), Value::from("US")],
        };
        let bad = RawRecord::Report {
            fields,
            values: vec![Value::from(2)],
        };
        // The intact row still lacks public_date, so it is also skipped; the
        // length check must fire first for the short row.
        assert!(normalize(bad, &cfg()).is_none());
        assert!(normalize(ok, &cfg()).is_none());
    }
}
