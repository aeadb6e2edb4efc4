use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use darwin_feed::StompHandle;
use ingestion::{CancellationCache, EnrichmentEngine};
use schedule_store::SqliteStore;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod common;
pub mod config;
pub mod logging;
pub mod rate_limit;

pub use api::health::HealthCache;
pub use config::Config;
pub use rate_limit::RateLimiter;

#[derive(Clone, FromRef)]
pub struct WebState {
    pub store: SqliteStore,
    pub cache: Arc<CancellationCache>,
    pub engine: Arc<EnrichmentEngine>,
    pub stomp_handle: StompHandle,
    pub rate_limiter: RateLimiter,
    pub health_cache: Arc<HealthCache>,
    pub config: Arc<Config>,
}

pub async fn start_web_server(state: WebState) -> std::io::Result<()> {
    let cors = build_cors_layer(&state.config.cors_origins);
    let timeout = Duration::from_millis(state.config.server_request_timeout_ms);
    let listen = state.config.server_listen.clone();

    let routes = api::routes(state.clone())
        .layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(tower_http::timeout::TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&listen).await?;
    axum::serve(listener, routes.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(parsed)
    }
}
