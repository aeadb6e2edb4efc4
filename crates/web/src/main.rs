//! Composition root: loads configuration, opens the Schedule Store, spawns
//! the STOMP subscriber and Enrichment pipeline tasks, then serves the
//! Query API: init logging, connect to the persisted store, wire the
//! background collector, hand the resulting client to `start_web_server`.

use std::process::ExitCode;
use std::sync::Arc;

use darwin_feed::{StompConfig, StompHandle};
use ingestion::{CancellationCache, EnrichmentEngine};
use tokio::sync::watch;
use web::{logging, start_web_server, Config, HealthCache, RateLimiter, WebState};

const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_STORE_INIT_FAILURE: u8 = 3;
const EXIT_STARTUP_FAILURE: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    logging::init(config.log_path.as_deref(), config.log_max_size_bytes, config.log_max_files);
    let _ = tracing_subscriber::fmt::try_init();

    let store = match schedule_store::SqliteStore::connect(&config.store_path).await {
        Ok(store) => store,
        Err(err) => {
            log::error!("could not open schedule store: {err}");
            return ExitCode::from(EXIT_STORE_INIT_FAILURE);
        }
    };

    let cache = Arc::new(CancellationCache::new(config.cache_max_entries, config.cache_max_age));
    let engine = Arc::new(EnrichmentEngine::new(store.clone()));
    let stomp_handle = StompHandle::new();
    let rate_limiter = RateLimiter::new(config.rate_limit_default_per_min, config.rate_limit_health_per_min);

    let (frames_tx, frames_rx) = darwin_feed::bounded_frame_channel(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stomp_config = StompConfig {
        host: config.broker_host.clone(),
        port: config.broker_port,
        user: config.broker_user.clone(),
        password: config.broker_password.clone(),
        topic: config.broker_topic.clone(),
        heartbeat_ms: config.broker_heartbeat_ms,
        backoff_max_ms: config.broker_backoff_max_ms,
    };

    let subscriber_task = tokio::spawn(darwin_feed::run_subscriber(
        stomp_config,
        stomp_handle.clone(),
        frames_tx,
        shutdown_rx.clone(),
    ));
    let pipeline_task = tokio::spawn(ingestion::run_pipeline(frames_rx, engine.clone(), cache.clone()));
    let retention_task = tokio::spawn(run_retention_sweeps(
        store.clone(),
        config.store_retention_days,
        shutdown_rx,
    ));

    let state = WebState {
        store,
        cache,
        engine,
        stomp_handle,
        rate_limiter,
        health_cache: Arc::new(HealthCache::default()),
        config: Arc::new(config),
    };

    let server = start_web_server(state);
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                log::error!("web server exited: {err}");
                let _ = shutdown_tx.send(true);
                return ExitCode::from(EXIT_STARTUP_FAILURE);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutdown requested");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), subscriber_task).await;
    pipeline_task.abort();
    retention_task.abort();

    ExitCode::SUCCESS
}

/// Enforces `store.retention_days` by sweeping expired schedules once a day.
/// Runs an initial sweep immediately on startup so a long-lived store
/// doesn't carry months of stale timetable data before the first interval
/// tick.
async fn run_retention_sweeps(
    store: schedule_store::SqliteStore,
    retention_days: u32,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 3600));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match store.purge_schedules_older_than(retention_days).await {
                    Ok(removed) if removed > 0 => {
                        log::info!("store retention sweep removed {removed} expired schedule(s)");
                    }
                    Ok(_) => {}
                    Err(err) => log::warn!("store retention sweep failed: {err}"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
