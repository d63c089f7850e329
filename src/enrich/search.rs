// src/enrich/search.rs
// Research-report search: given an event title and date, pull related report
// snippets from the Reportify API. Everything here is best-effort; the
// enrichment service treats any failure as an empty result set.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

/// One research snippet, already reduced to what the analysis prompt needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchSnippet {
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub institution: String,
    pub author: String,
    pub industries: BTreeSet<String>,
    pub concepts: BTreeSet<String>,
    /// Display names, each optionally annotated with a stock symbol.
    pub companies: Vec<String>,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Related research for `(query, date)`. Must respect a bounded timeout.
    async fn related_reports(&self, query: &str, date: NaiveDate) -> Result<Vec<ResearchSnippet>>;
    fn name(&self) -> &'static str;
}

pub const REPORTIFY_URL: &str = "https://api.reportify.cn/reports";

/// Report-type ids requested from the API (analyst and broker research).
const REPORT_TYPES: &str = "7,8,9,10,11,16,19,20,21,22,23,24,25";

pub struct ReportifyClient {
    http: reqwest::Client,
    url: String,
}

impl ReportifyClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_url(REPORTIFY_URL, timeout)
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("wscn-calendar-sync/0.1 (+github.com/wscn-calendar-sync)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SearchClient for ReportifyClient {
    async fn related_reports(&self, query: &str, _date: NaiveDate) -> Result<Vec<ResearchSnippet>> {
        let rt = Utc::now().timestamp_millis().to_string();
        let resp: ReportifyResponse = self
            .http
            .get(&self.url)
            .query(&[
                ("page_num", "1"),
                ("page_size", "10"),
                ("channel_id", ""),
                ("report_types", REPORT_TYPES),
                ("query", query),
                ("rt", rt.as_str()),
            ])
            .send()
            .await
            .context("reportify get()")?
            .error_for_status()
            .context("reportify status")?
            .json()
            .await
            .context("reportify json")?;

        let items = resp.items.unwrap_or_default();
        debug!(query, results = items.len(), "reportify search done");
        Ok(items
            .into_iter()
            .filter(|it| !it.summary.is_empty())
            .map(snippet_from_item)
            .collect())
    }

    fn name(&self) -> &'static str {
        "reportify"
    }
}

#[derive(Debug, Deserialize)]
struct ReportifyResponse {
    #[serde(default)]
    items: Option<Vec<ReportItem>>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    report_url: String,
    #[serde(default)]
    institution_name: String,
    #[serde(default)]
    author_names: String,
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    companies: Vec<Company>,
}

#[derive(Debug, Default, Deserialize)]
struct Labels {
    #[serde(default)]
    industry: Vec<String>,
    #[serde(default)]
    concept: Vec<String>,
    #[serde(default)]
    company: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Company {
    Detailed {
        #[serde(default)]
        name: String,
        #[serde(default)]
        stocks: Vec<Stock>,
    },
    Plain(String),
}

#[derive(Debug, Default, Deserialize)]
struct Stock {
    #[serde(default)]
    symbol: String,
}

fn snippet_from_item(item: ReportItem) -> ResearchSnippet {
    let mut companies: Vec<String> = item
        .companies
        .iter()
        .filter_map(|c| match c {
            Company::Detailed { name, stocks } if !name.is_empty() => {
                Some(match preferred_symbol(stocks) {
                    Some(sym) => format!("{name}({sym})"),
                    None => name.clone(),
                })
            }
            Company::Plain(name) if !name.is_empty() => Some(name.clone()),
            _ => None,
        })
        .collect();

    // Fallbacks: 【公司】 markers embedded in the summary, then label data.
    if companies.is_empty() {
        companies = bracketed_names(&item.summary);
    }
    if companies.is_empty() {
        companies = item.labels.company.clone();
    }

    ResearchSnippet {
        title: item.title,
        summary: item.summary,
        source_url: item.report_url,
        institution: item.institution_name,
        author: item.author_names,
        industries: item.labels.industry.into_iter().collect(),
        concepts: item.labels.concept.into_iter().collect(),
        companies,
    }
}

/// Preferred listing for the annotation: A-share (SH:/SZ:) over HK: over US:.
fn preferred_symbol(stocks: &[Stock]) -> Option<String> {
    let mut hk = None;
    let mut us = None;
    for stock in stocks {
        let sym = stock.symbol.as_str();
        if sym.is_empty() {
            continue;
        }
        if sym.starts_with("SH:") || sym.starts_with("SZ:") {
            return Some(sym.to_string());
        }
        if sym.starts_with("HK:") && hk.is_none() {
            hk = Some(sym.to_string());
        } else if sym.starts_with("US:") && us.is_none() {
            us = Some(sym.to_string());
        }
    }
    hk.or(us)
}

fn bracketed_names(summary: &str) -> Vec<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"【([^】]+)】").unwrap());
    re.captures_iter(summary)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
