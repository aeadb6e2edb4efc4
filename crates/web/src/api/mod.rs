use axum::routing::get;
use axum::Router;

use crate::common::route_not_found;
use crate::WebState;

pub(crate) mod cancellations;
pub(crate) mod dashboard;
pub mod health;
pub(crate) mod metrics;

pub fn routes(state: WebState) -> Router {
    Router::new()
        .nest_service("/cancellations", cancellations::routes(state.clone()))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/deep", get(health::deep))
        .route("/metrics", get(metrics::metrics))
        .with_state(state)
        .fallback(route_not_found)
}
