use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{route_not_found, RouteResult};
use crate::WebState;
use ingestion::{CacheStats, RouteSummary};
use model::ActiveCancellation;
use schedule_store::StoreStatistics;

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/", get(recent))
        .route("/enriched", get(enriched))
        .route("/by-route", get(by_route))
        .route("/stats", get(stats))
        .route("/dashboard", get(super::dashboard::dashboard))
        .with_state(state)
        .fallback(route_not_found)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    since: Option<String>,
}

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

fn resolve_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
}

fn resolve_since(since: Option<String>) -> RouteResult<Option<DateTime<Utc>>> {
    match since {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| crate::common::RouteErrorResponse::bad_request(format!("invalid `since`: {raw}"))),
    }
}

async fn recent(
    State(state): State<WebState>,
    Query(query): Query<ListQuery>,
) -> RouteResult<Json<Vec<ActiveCancellation>>> {
    let since = resolve_since(query.since)?;
    Ok(Json(state.cache.recent(resolve_limit(query.limit), since)))
}

async fn enriched(
    State(state): State<WebState>,
    Query(query): Query<ListQuery>,
) -> RouteResult<Json<Vec<ActiveCancellation>>> {
    let since = resolve_since(query.since)?;
    Ok(Json(state.cache.enriched(resolve_limit(query.limit), since)))
}

async fn by_route(State(state): State<WebState>) -> Json<Vec<RouteSummary>> {
    Json(state.cache.by_route())
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    cache: CacheStats,
    enrichment_failures_by_reason: ingestion::enrichment::EnrichmentFailuresSnapshot,
    schedule_store: StoreStatistics,
}

async fn stats(State(state): State<WebState>) -> RouteResult<Json<StatsResponse>> {
    let enrichment = state.engine.stats.snapshot();
    let schedule_store = state
        .store
        .statistics()
        .await
        .map_err(|_| crate::common::RouteErrorResponse::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR))?;

    Ok(Json(StatsResponse {
        cache: state.cache.stats(),
        enrichment_failures_by_reason: enrichment.enrichment_failures_by_reason,
        schedule_store,
    }))
}
