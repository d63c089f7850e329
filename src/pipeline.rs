// src/pipeline.rs
// One pipeline run over a closed input batch: fetch → normalize → enrich →
// assemble. Per-record and per-event failures are absorbed and logged; only
// a total inability to obtain any input batch escalates to the caller.

use anyhow::{bail, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::assemble::assemble;
use crate::enrich::Enricher;
use crate::event::Event;
use crate::feed::FeedProvider;
use crate::normalize::{normalize, NormalizeConfig};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "calendar_records_total",
            "Raw records fetched from feed providers."
        );
        describe_counter!(
            "calendar_records_skipped_total",
            "Records dropped during normalization (unparseable/filtered)."
        );
        describe_counter!(
            "calendar_events_kept_total",
            "Canonical events produced by normalization."
        );
        describe_counter!("calendar_dedup_total", "Events replaced by uid dedup.");
        describe_counter!(
            "calendar_provider_errors_total",
            "Feed provider fetch/parse errors."
        );
        describe_counter!(
            "enrich_search_failures_total",
            "Research searches that failed or timed out."
        );
        describe_counter!(
            "enrich_failures_total",
            "Enrichments degraded to the plain description."
        );
        describe_histogram!("enrich_duration_ms", "Per-event enrichment time.");
        describe_gauge!(
            "calendar_last_run_ts",
            "Unix ts when the pipeline last completed."
        );
    });
}

#[derive(Debug)]
pub struct RunOutcome {
    pub events: Vec<Event>,
    /// Raw records fetched across all providers.
    pub fetched: usize,
    /// Records skipped during normalization.
    pub skipped: usize,
    /// Events replaced by uid dedup.
    pub duplicates: usize,
}

impl RunOutcome {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Run the pipeline once. `enricher` is optional; without it events keep
/// their plain descriptions.
pub async fn run_once(
    providers: &[Box<dyn FeedProvider>],
    cfg: &NormalizeConfig,
    enricher: Option<&Enricher>,
) -> Result<RunOutcome> {
    ensure_metrics_described();

    let mut raw = Vec::new();
    let mut provider_errors = 0usize;
    for provider in providers {
        match provider.fetch().await {
            Ok(mut batch) => {
                info!(provider = provider.name(), records = batch.len(), "feed fetched");
                raw.append(&mut batch);
            }
            Err(e) => {
                warn!(error = ?e, provider = provider.name(), "provider error");
                counter!("calendar_provider_errors_total").increment(1);
                provider_errors += 1;
            }
        }
    }
    if !providers.is_empty() && provider_errors == providers.len() {
        bail!("all feed providers failed, no input batch");
    }

    let fetched = raw.len();
    let mut events: Vec<Event> = Vec::with_capacity(fetched);
    let mut skipped = 0usize;
    for record in raw {
        match normalize(record, cfg) {
            Some(event) => events.push(event),
            None => skipped += 1,
        }
    }
    counter!("calendar_events_kept_total").increment(events.len() as u64);
    counter!("calendar_records_skipped_total").increment(skipped as u64);

    if let Some(enricher) = enricher {
        enricher.enrich_all(&mut events).await;
    }

    let assembled = assemble(events);
    if assembled.is_empty() {
        // Completed successfully, produced nothing: reportable, not an error.
        warn!(fetched, skipped, "pipeline run produced an empty event set");
    }

    gauge!("calendar_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    Ok(RunOutcome {
        events: assembled.events,
        fetched,
        skipped,
        duplicates: assembled.duplicates,
    })
}
