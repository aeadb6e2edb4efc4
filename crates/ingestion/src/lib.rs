//! Enrichment and caching of Darwin cancellations, plus the pipeline task
//! that wires the two together with the feed channel `darwin_feed`
//! produces.

pub mod cache;
pub mod enrichment;
pub mod pipeline;

pub use cache::{CacheStats, CancellationCache, RouteSummary};
pub use enrichment::{EnrichmentEngine, EnrichmentStats, EnrichmentStatsSnapshot};
pub use pipeline::run_pipeline;

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("schedule store error: {0}")]
    Store(#[from] schedule_store::Error),
}
