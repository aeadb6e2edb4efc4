//! Persistent STOMP subscriber for the Darwin push-port.
//!
//! Framing, heartbeats, and the CONNECT/SUBSCRIBE handshake are handled by
//! `tokio_stomp`; this module owns only the reconnect state machine,
//! back-off, and the bridge from `tokio_stomp`'s frame stream to the bounded
//! channel the Enrichment pipeline reads from. The state handle is an
//! `RwLock`-protected struct consulted before every network operation,
//! the same shape a request-rate gate would use, generalized here to a
//! connection-lifecycle gate.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{watch, RwLock};
use tokio::time::timeout;
use tokio_stomp::client;
use tokio_stomp::FromServer;

use crate::frame_queue::FrameSender;

#[derive(Debug, thiserror::Error)]
pub enum StompError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
    #[error("broker reported an error: {0}")]
    Broker(String),
    #[error("frame stream ended unexpectedly")]
    StreamClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StompState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Receiving,
    Reconnecting,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct StompConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub topic: String,
    pub heartbeat_ms: u64,
    pub backoff_max_ms: u64,
}

/// Shared, cloneable view of the subscriber's current lifecycle state, for
/// `/health/ready` and `/health/deep` to consult without touching the
/// connection itself.
#[derive(Clone)]
pub struct StompHandle {
    state: Arc<RwLock<StompState>>,
}

impl StompHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StompState::Disconnected)),
        }
    }

    pub async fn state(&self) -> StompState {
        *self.state.read().await
    }

    async fn set(&self, state: StompState) {
        *self.state.write().await = state;
    }
}

impl Default for StompHandle {
    fn default() -> Self {
        Self::new()
    }
}

struct BackOff {
    base_ms: u64,
    max_ms: u64,
    current_ms: u64,
}

impl BackOff {
    fn new(max_ms: u64) -> Self {
        Self {
            base_ms: 1000,
            max_ms,
            current_ms: 1000,
        }
    }

    fn reset(&mut self) {
        self.current_ms = self.base_ms;
    }

    fn next(&mut self) -> Duration {
        let delay = jittered(self.current_ms);
        self.current_ms = (self.current_ms * 2).min(self.max_ms);
        delay
    }

    /// Authentication failures back off four times as aggressively, to
    /// avoid hammering the broker into a lockout, without disturbing the
    /// connection-failure back-off track.
    fn next_auth(&mut self) -> Duration {
        jittered((self.current_ms * 4).min(self.max_ms * 4))
    }
}

fn jittered(ms: u64) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..1.2);
    Duration::from_millis((ms as f64 * factor) as u64)
}

/// Runs the subscriber until `shutdown` is signalled. Intended to be the
/// sole owner of the STOMP connection, spawned once by the composition root
/// alongside the Enrichment pipeline task it feeds via `frames_tx`.
pub async fn run_subscriber(
    config: StompConfig,
    handle: StompHandle,
    frames_tx: FrameSender,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = BackOff::new(config.backoff_max_ms);

    loop {
        if *shutdown.borrow() {
            handle.set(StompState::Stopped).await;
            frames_tx.close();
            return;
        }

        handle.set(StompState::Connecting).await;
        match connect_and_receive(&config, &handle, &frames_tx, &mut shutdown).await {
            Ok(ShutdownRequested) => {
                handle.set(StompState::Stopped).await;
                frames_tx.close();
                return;
            }
            Err(err) => {
                log::warn!("darwin_feed.stomp: connection lost: {err}");
                handle.set(StompState::Reconnecting).await;
                let delay = match err {
                    StompError::Auth(_) => backoff.next_auth(),
                    _ => backoff.next(),
                };
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            handle.set(StompState::Stopped).await;
                            frames_tx.close();
                            return;
                        }
                    }
                }
            }
        }
    }
}

struct ShutdownRequested;

async fn connect_and_receive(
    config: &StompConfig,
    handle: &StompHandle,
    frames_tx: &FrameSender,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ShutdownRequested, StompError> {
    let server = format!("{}:{}", config.host, config.port);
    let mut conn = client::connect(&server, config.user.clone(), config.password.clone(), None)
        .await
        .map_err(|e| StompError::Connect(e.to_string()))?;
    handle.set(StompState::Connected).await;

    conn.send(client::subscribe(&config.topic, "darwin-feed"))
        .await
        .map_err(|e| StompError::Connect(e.to_string()))?;
    handle.set(StompState::Subscribed).await;

    let mut missed_heartbeats = 0u8;
    let heartbeat_interval = Duration::from_millis(config.heartbeat_ms.max(1000));

    loop {
        tokio::select! {
            frame = timeout(heartbeat_interval, conn.next()) => {
                let frame = match frame {
                    Ok(Some(Ok(frame))) => frame,
                    Ok(Some(Err(why))) => return Err(StompError::Broker(why.to_string())),
                    Ok(None) => return Err(StompError::StreamClosed),
                    Err(_elapsed) => {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            return Err(StompError::HeartbeatTimeout);
                        }
                        continue;
                    }
                };
                missed_heartbeats = 0;
                handle.set(StompState::Receiving).await;

                match frame.content {
                    FromServer::Message { body, .. } => {
                        let Some(body) = body else { continue };
                        let Ok(text) = String::from_utf8(body) else { continue };
                        frames_tx.push(text).await;
                    }
                    FromServer::Error { message, .. } => {
                        return Err(StompError::Broker(message));
                    }
                    FromServer::Connected { .. } | FromServer::Receipt { .. } => {}
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = timeout(Duration::from_secs(2), conn.send(client::unsubscribe("darwin-feed"))).await;
                    return Ok(ShutdownRequested);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn backoff_doubles_and_caps_with_jitter() {
        let mut backoff = BackOff::new(8_000);
        for _ in 0..6 {
            let delay = backoff.next().as_millis() as u64;
            assert!(delay <= 8_000 + 8_000 / 5);
        }
    }

    #[test]
    fn backoff_resets_to_base_after_success() {
        let mut backoff = BackOff::new(8_000);
        backoff.next();
        backoff.next();
        backoff.reset();
        let delay = backoff.next().as_millis() as u64;
        assert!(delay <= 1_000 + 1_000 / 5);
    }

    #[tokio::test]
    async fn reconnects_when_broker_closes_immediately() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    drop(socket);
                }
            }
        });

        let handle = StompHandle::new();
        let (frames_tx, _frames_rx) = crate::frame_queue::bounded_frame_channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let config = StompConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            user: None,
            password: None,
            topic: "/topic/darwin".to_string(),
            heartbeat_ms: 1000,
            backoff_max_ms: 50,
        };

        let task = tokio::spawn(run_subscriber(config, handle.clone(), frames_tx, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(handle.state().await, StompState::Reconnecting);

        shutdown_tx.send(true).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(3), task).await;
    }
}
