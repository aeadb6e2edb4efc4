//! Per-source-address token bucket, in the same shape `BahnApiClient` uses
//! for its own availability bookkeeping: a guarded state struct consulted
//! and decremented before the call is allowed through, refilled on a
//! wall-clock schedule rather than a background task.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use crate::common::RouteErrorResponse;

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity_per_min: u32) -> Self {
        let capacity = capacity_per_min as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self) -> Result<(), u64> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = (deficit / self.refill_per_sec).ceil() as u64;
            Err(wait_secs.max(1))
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    default_per_min: u32,
    health_per_min: u32,
    buckets: Arc<Mutex<HashMap<(IpAddr, bool), Bucket>>>,
}

impl RateLimiter {
    pub fn new(default_per_min: u32, health_per_min: u32) -> Self {
        Self {
            default_per_min,
            health_per_min,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn check(&self, addr: IpAddr, is_health: bool) -> Result<(), u64> {
        let mut buckets = self.buckets.lock().await;
        let capacity = if is_health { self.health_per_min } else { self.default_per_min };
        let bucket = buckets
            .entry((addr, is_health))
            .or_insert_with(|| Bucket::new(capacity));
        bucket.try_take()
    }

    /// Evicts buckets untouched for longer than `idle_for`, so a
    /// long-running process doesn't accumulate one entry per client
    /// forever.
    pub async fn sweep(&self, idle_for: Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < idle_for);
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let is_health = request.uri().path().starts_with("/health");
    match limiter.check(addr.ip(), is_health).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let mut response = RouteErrorResponse::rate_limited(retry_after).into_response();
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_refills_over_time() {
        let mut bucket = Bucket::new(60);
        for _ in 0..60 {
            assert!(bucket.try_take().is_ok());
        }
        assert!(bucket.try_take().is_err());
    }

    #[tokio::test]
    async fn rate_limiter_tracks_addresses_independently() {
        let limiter = RateLimiter::new(1, 60);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();

        assert!(limiter.check(a, false).await.is_ok());
        assert!(limiter.check(a, false).await.is_err());
        assert!(limiter.check(b, false).await.is_ok());
    }
}
