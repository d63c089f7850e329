//! WSCN Calendar Sync — Binary Entrypoint
//! Fetches the week's WallStreetCN feeds, normalizes them into canonical
//! events, optionally enriches them, and writes .ics artifacts.
//!
//! See `README.md` for quickstart.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wscn_calendar_sync::config::SyncConfig;
use wscn_calendar_sync::enrich::analysis::OpenAiClient;
use wscn_calendar_sync::enrich::search::ReportifyClient;
use wscn_calendar_sync::enrich::Enricher;
use wscn_calendar_sync::feed::wscn::{
    MacroDataFeed, MacroIndicatorFeed, ReportFeed, GLOBAL_INDICATOR_URL,
};
use wscn_calendar_sync::feed::FeedProvider;
use wscn_calendar_sync::ics::serialize_calendar;
use wscn_calendar_sync::normalize::NormalizeConfig;
use wscn_calendar_sync::pipeline::run_once;
use wscn_calendar_sync::store::{ArtifactSink, FsSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FeedKind {
    /// Macro-data calendar (filtered by country/importance, enriched).
    Macro,
    /// Global economic calendar (pre-built events feed, enriched).
    Global,
    /// China economic calendar (pre-built events feed).
    China,
    /// Company earnings reports for the current week.
    Reports,
    /// All of the above.
    All,
}

#[derive(Debug, Parser)]
#[command(name = "wscn-calendar-sync", about = "WallStreetCN calendar → ICS sync")]
struct Cli {
    /// Which feed(s) to sync.
    #[arg(value_enum, default_value = "all")]
    feed: FeedKind,
    /// Config file path (default: config/calendar.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output directory override.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_enricher(cfg: &SyncConfig) -> Option<Enricher> {
    if !cfg.enrich.enabled {
        info!("enrichment disabled by config");
        return None;
    }
    let search = Arc::new(ReportifyClient::new(Duration::from_secs(
        cfg.enrich.search_timeout_secs,
    )));
    let analysis = Arc::new(OpenAiClient::new(
        cfg.enrich.api_key.clone(),
        Some(cfg.enrich.model.as_str()),
        Duration::from_secs(cfg.enrich.analysis_timeout_secs),
    ));
    Some(
        Enricher::new(search, analysis)
            .with_timeouts(
                Duration::from_secs(cfg.enrich.search_timeout_secs),
                Duration::from_secs(cfg.enrich.analysis_timeout_secs),
            )
            .with_concurrency(cfg.enrich.concurrency),
    )
}

async fn sync_feed(
    providers: Vec<Box<dyn FeedProvider>>,
    artifact: &str,
    norm: &NormalizeConfig,
    enricher: Option<&Enricher>,
    sink: &FsSink,
) -> Result<()> {
    let outcome = run_once(&providers, norm, enricher).await?;
    info!(
        artifact,
        events = outcome.events.len(),
        fetched = outcome.fetched,
        skipped = outcome.skipped,
        duplicates = outcome.duplicates,
        "sync finished"
    );
    if outcome.is_empty() {
        warn!(artifact, "no events this week, artifact left untouched");
        return Ok(());
    }
    let ics = serialize_calendar(&outcome.events);
    if let Err(e) = sink.write(artifact, &ics) {
        // The calendar itself is fine; only delivery failed.
        error!(error = ?e, artifact, "artifact write failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = SyncConfig::load_or_default(cli.config.as_deref())?;
    let tz = cfg.reference_tz()?;
    let norm = cfg.normalize_config()?;
    let feed_timeout = Duration::from_secs(cfg.feed_timeout_secs);
    let sink = match &cli.output {
        Some(dir) => FsSink::new(dir.clone()),
        None => FsSink::new(&cfg.output_dir),
    };

    let enricher = build_enricher(&cfg);

    let mut runs = 0usize;
    let mut failures = 0usize;

    if matches!(cli.feed, FeedKind::Macro | FeedKind::All) {
        runs += 1;
        let providers: Vec<Box<dyn FeedProvider>> =
            vec![Box::new(MacroDataFeed::new(tz, feed_timeout))];
        if let Err(e) = sync_feed(providers, "wsc_events.ics", &norm, enricher.as_ref(), &sink).await
        {
            error!(error = ?e, "macro-data sync failed");
            failures += 1;
        }
    }

    if matches!(cli.feed, FeedKind::Global | FeedKind::All) {
        runs += 1;
        let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(
            MacroIndicatorFeed::with_url(GLOBAL_INDICATOR_URL, feed_timeout),
        )];
        if let Err(e) = sync_feed(
            providers,
            "wsc_global_events.ics",
            &norm,
            enricher.as_ref(),
            &sink,
        )
        .await
        {
            error!(error = ?e, "global calendar sync failed");
            failures += 1;
        }
    }

    if matches!(cli.feed, FeedKind::China | FeedKind::All) {
        runs += 1;
        let providers: Vec<Box<dyn FeedProvider>> =
            vec![Box::new(MacroIndicatorFeed::new(feed_timeout))];
        if let Err(e) = sync_feed(providers, "wsc_china_events.ics", &norm, None, &sink).await {
            error!(error = ?e, "china calendar sync failed");
            failures += 1;
        }
    }

    if matches!(cli.feed, FeedKind::Reports | FeedKind::All) {
        runs += 1;
        let providers: Vec<Box<dyn FeedProvider>> =
            vec![Box::new(ReportFeed::new(tz, feed_timeout))];
        if let Err(e) = sync_feed(providers, "wsc_reports.ics", &norm, None, &sink).await {
            error!(error = ?e, "reports sync failed");
            failures += 1;
        }
    }

    if runs > 0 && failures == runs {
        bail!("all selected syncs failed");
    }
    Ok(())
}
