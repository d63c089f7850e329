// src/enrich/mod.rs
pub mod analysis;
pub mod format;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::enrich::analysis::{build_prompt, parse_analysis, AnalysisClient, AnalysisResult};
use crate::enrich::format::format_analysis;
use crate::enrich::search::SearchClient;
use crate::event::Event;

/// Best-effort event enrichment. Every step degrades on failure; the caller
/// always gets a description back.
#[derive(Clone)]
pub struct Enricher {
    search: Arc<dyn SearchClient>,
    analysis: Arc<dyn AnalysisClient>,
    search_timeout: Duration,
    analysis_timeout: Duration,
    concurrency: usize,
}

impl Enricher {
    pub fn new(search: Arc<dyn SearchClient>, analysis: Arc<dyn AnalysisClient>) -> Self {
        Self {
            search,
            analysis,
            search_timeout: Duration::from_secs(10),
            analysis_timeout: Duration::from_secs(30),
            concurrency: 4,
        }
    }

    pub fn with_timeouts(mut self, search: Duration, analysis: Duration) -> Self {
        self.search_timeout = search;
        self.analysis_timeout = analysis;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Enrich one event. Never fails: the worst case is the plain description
    /// assembled from the event's structured facts.
    pub async fn enrich(&self, event: &Event) -> String {
        let t0 = std::time::Instant::now();

        // Step 1: research search. Timeout or error means an empty result
        // set, not a failed enrichment.
        let snippets = match timeout(
            self.search_timeout,
            self.search.related_reports(&event.title, event.date()),
        )
        .await
        {
            Ok(Ok(snippets)) => snippets,
            Ok(Err(e)) => {
                warn!(error = ?e, uid = %event.uid, "research search failed");
                counter!("enrich_search_failures_total").increment(1);
                Vec::new()
            }
            Err(_) => {
                warn!(uid = %event.uid, "research search timed out");
                counter!("enrich_search_failures_total").increment(1);
                Vec::new()
            }
        };

        // Step 2: generative analysis. An empty-context prompt is still
        // attempted; an unusable reply becomes the sentinel result.
        let prompt = build_prompt(&event.title, event.date(), &snippets);
        let analysis = self.analyze(&event.uid, &prompt).await;

        // Step 3: render. A sentinel or absent analysis degrades to the
        // structured facts only.
        let basic = event.basic_description();
        let out = match analysis {
            Some(a) if !a.is_unavailable() => {
                let rendered = format_analysis(&a);
                if basic.is_empty() {
                    rendered
                } else {
                    format!("{basic}\n\n{rendered}")
                }
            }
            _ => {
                counter!("enrich_failures_total").increment(1);
                basic
            }
        };

        histogram!("enrich_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        out
    }

    async fn analyze(&self, uid: &str, prompt: &str) -> Option<AnalysisResult> {
        match timeout(self.analysis_timeout, self.analysis.generate(prompt)).await {
            Ok(Ok(reply)) => Some(parse_analysis(&reply).unwrap_or_else(|| {
                warn!(uid, "analysis reply failed the schema contract");
                AnalysisResult::unavailable()
            })),
            Ok(Err(e)) => {
                debug!(error = ?e, uid, "analysis unavailable");
                None
            }
            Err(_) => {
                warn!(uid, "analysis timed out");
                None
            }
        }
    }

    /// Enrich a batch concurrently under the configured cap. Events are
    /// independent; results are reattached by position, so completion order
    /// doesn't matter.
    pub async fn enrich_all(&self, events: &mut [Event]) {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut join = JoinSet::new();

        for (idx, event) in events.iter().enumerate() {
            let enricher = self.clone();
            let event = event.clone();
            let sem = Arc::clone(&sem);
            join.spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore closed");
                let description = enricher.enrich(&event).await;
                (idx, description)
            });
        }

        while let Some(res) = join.join_next().await {
            match res {
                Ok((idx, description)) => {
                    events[idx].enriched_description = Some(description);
                }
                Err(e) => warn!(error = ?e, "enrichment task failed"),
            }
        }
    }
}
