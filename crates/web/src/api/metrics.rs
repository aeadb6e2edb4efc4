//! Hand-written Prometheus-style text exposition. No metrics
//! crate: the counter set is small and fixed, so a `format!`-built body
//! keeps this crate's dependency list free of a registry it would barely
//! use.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::WebState;

pub(crate) async fn metrics(State(state): State<WebState>) -> impl IntoResponse {
    let enrichment = state.engine.stats.snapshot();
    let cache_stats = state.cache.stats();
    let store_stats = state.store.statistics().await.ok();

    let mut body = String::new();
    body.push_str(&format!("railwatch_decoded_total {}\n", enrichment.decoded_total));
    body.push_str(&format!("railwatch_cancellations_total {}\n", enrichment.cancellations_total));
    body.push_str(&format!("railwatch_enriched_total {}\n", enrichment.enriched_total));
    body.push_str(&format!(
        "railwatch_enrichment_failures_total{{reason=\"no_rid\"}} {}\n",
        enrichment.enrichment_failures_by_reason.no_rid
    ));
    body.push_str(&format!(
        "railwatch_enrichment_failures_total{{reason=\"no_schedule\"}} {}\n",
        enrichment.enrichment_failures_by_reason.no_schedule
    ));
    body.push_str(&format!(
        "railwatch_enrichment_failures_total{{reason=\"ambiguous\"}} {}\n",
        enrichment.enrichment_failures_by_reason.ambiguous
    ));
    body.push_str(&format!(
        "railwatch_enrichment_failures_total{{reason=\"store_error\"}} {}\n",
        enrichment.enrichment_failures_by_reason.store_error
    ));
    body.push_str(&format!("railwatch_cache_entries {}\n", cache_stats.total));
    body.push_str(&format!("railwatch_cache_enrichment_rate {}\n", cache_stats.enrichment_rate));

    if let Some(stats) = store_stats {
        body.push_str(&format!("railwatch_store_schedules {}\n", stats.schedule_count));
        body.push_str(&format!("railwatch_store_stations {}\n", stats.station_count));
    }

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
