// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod assemble;
pub mod config;
pub mod enrich;
pub mod event;
pub mod feed;
pub mod ics;
pub mod normalize;
pub mod pipeline;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::assemble::{assemble, Assembled};
pub use crate::config::SyncConfig;
pub use crate::enrich::Enricher;
pub use crate::event::{DayKind, Event};
pub use crate::feed::FeedProvider;
pub use crate::ics::serialize_calendar;
pub use crate::normalize::{normalize, NormalizeConfig};
pub use crate::pipeline::{run_once, RunOutcome};
pub use crate::store::{ArtifactSink, FsSink};
