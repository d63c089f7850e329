// tests/pipeline_e2e.rs
// End-to-end pipeline runs against mock feed providers: fetch → normalize →
// assemble, with provider failures absorbed unless every provider fails.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use wscn_calendar_sync::enrich::analysis::AnalysisClient;
use wscn_calendar_sync::enrich::search::{ResearchSnippet, SearchClient};
use wscn_calendar_sync::enrich::Enricher;
use wscn_calendar_sync::feed::{
    report_rows, FeedProvider, MacroDataRecord, MacroIndicatorRecord, RawRecord,
};
use wscn_calendar_sync::normalize::NormalizeConfig;
use wscn_calendar_sync::pipeline::run_once;
use wscn_calendar_sync::serialize_calendar;

struct StaticFeed(Vec<RawRecord>);

#[async_trait]
impl FeedProvider for StaticFeed {
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

struct BrokenFeed;

#[async_trait]
impl FeedProvider for BrokenFeed {
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        bail!("upstream 502")
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

fn cfg() -> NormalizeConfig {
    NormalizeConfig::new(chrono_tz::Asia::Shanghai)
}

fn macro_data(id: i64, title: &str) -> RawRecord {
    RawRecord::MacroData(MacroDataRecord {
        id: Some(Value::from(id)),
        public_date: Some(1_742_214_600), // 2025-03-17 20:30 +08
        country: "美国".to_string(),
        importance: 3,
        title: Some(title.to_string()),
        ..Default::default()
    })
}

#[tokio::test]
async fn mixed_batch_is_normalized_filtered_and_deduped() {
    let mut records = vec![
        macro_data(1, "2月零售销售环比"),
        // Filtered out: wrong importance level.
        RawRecord::MacroData(MacroDataRecord {
            id: Some(Value::from(2)),
            public_date: Some(1_742_214_600),
            country: "美国".to_string(),
            importance: 1,
            title: Some("次要指标".to_string()),
            ..Default::default()
        }),
        RawRecord::MacroIndicator(MacroIndicatorRecord {
            uid: "china-1".to_string(),
            dt_start: Some("2025-03-17 10:00:00".to_string()),
            summary: "中国2月社会消费品零售总额".to_string(),
        }),
        // Later duplicate of id 1 replaces the earlier payload.
        macro_data(1, "2月零售销售环比(修正)"),
    ];
    records.extend(report_rows(
        vec!["id".to_string(), "public_date".to_string()],
        vec![
            vec![Value::from(9), Value::from(1_742_214_600)],
            // Length mismatch: skipped.
            vec![Value::from(10)],
        ],
    ));

    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed(records))];
    let outcome = run_once(&providers, &cfg(), None).await.unwrap();

    assert_eq!(outcome.fetched, 6);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.duplicates, 1);

    let uids: Vec<&str> = outcome.events.iter().map(|e| e.uid.as_str()).collect();
    assert_eq!(uids, vec!["1_wscn_macro", "china-1", "9_wscn_report"]);
    assert_eq!(outcome.events[0].title, "🇺🇸 2月零售销售环比(修正)");
}

#[tokio::test]
async fn one_healthy_provider_keeps_the_run_alive() {
    let providers: Vec<Box<dyn FeedProvider>> = vec![
        Box::new(BrokenFeed),
        Box::new(StaticFeed(vec![macro_data(5, "CPI")])),
    ];
    let outcome = run_once(&providers, &cfg(), None).await.unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].uid, "5_wscn_macro");
}

#[tokio::test]
async fn all_providers_failing_is_an_error() {
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(BrokenFeed), Box::new(BrokenFeed)];
    let err = run_once(&providers, &cfg(), None).await.unwrap_err();
    assert!(err.to_string().contains("all feed providers failed"));
}

#[tokio::test]
async fn empty_batch_is_a_valid_empty_outcome() {
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed(vec![]))];
    let outcome = run_once(&providers, &cfg(), None).await.unwrap();
    assert!(outcome.is_empty());
    assert_eq!(outcome.fetched, 0);
    assert_eq!(outcome.skipped, 0);
}

struct EmptySearch;

#[async_trait]
impl SearchClient for EmptySearch {
    async fn related_reports(&self, _q: &str, _d: NaiveDate) -> Result<Vec<ResearchSnippet>> {
        Ok(Vec::new())
    }
    fn name(&self) -> &'static str {
        "empty-search"
    }
}

struct CannedAnalysis;

#[async_trait]
impl AnalysisClient for CannedAnalysis {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(r#"{
            "related_sectors": {"industries": [], "concepts": [], "companies": []},
            "investment_opportunities": [{"type": "行业", "target": "零售板块", "rationale": "数据超预期"}],
            "potential_risks": [{"type": "宏观", "description": "通胀反弹", "mitigation": "分批建仓"}],
            "potential_returns": {"timeframe": "3-6个月", "upside": "10-15%", "catalysts": []}
        }"#
        .to_string())
    }
    fn name(&self) -> &'static str {
        "canned"
    }
}

// The pre-built global/china calendar records use the string schema; a run
// with the enricher wired in must attach commentary to them too.
#[tokio::test]
async fn indicator_events_are_enriched_through_the_pipeline() {
    let records = vec![RawRecord::MacroIndicator(MacroIndicatorRecord {
        uid: "global-1".to_string(),
        dt_start: Some("2025-03-17 20:30:00".to_string()),
        summary: "美国2月零售销售环比".to_string(),
    })];
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed(records))];
    let enricher = Enricher::new(Arc::new(EmptySearch), Arc::new(CannedAnalysis));

    let outcome = run_once(&providers, &cfg(), Some(&enricher)).await.unwrap();
    assert_eq!(outcome.events.len(), 1);
    let description = outcome.events[0].enriched_description.as_deref().unwrap();
    assert!(description.contains("🔍 投资分析"));
    assert!(description.contains("零售板块"));
}

#[tokio::test]
async fn outcome_serializes_to_ics() {
    let providers: Vec<Box<dyn FeedProvider>> =
        vec![Box::new(StaticFeed(vec![macro_data(3, "非农就业人数")]))];
    let outcome = run_once(&providers, &cfg(), None).await.unwrap();
    let ics = serialize_calendar(&outcome.events);
    assert!(ics.starts_with("BEGIN:VCALENDAR"));
    assert!(ics.contains("UID:3_wscn_macro"));
    assert!(ics.contains("DTSTART;TZID=Asia/Shanghai:20250317T203000"));
}
