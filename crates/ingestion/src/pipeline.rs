//! Wires the raw-frame channel fed by `darwin_feed::run_subscriber` to the
//! Enrichment Engine and Cancellation Cache.
//! One task owns this loop; it never blocks on network I/O, so the
//! Enrichment Engine's store reads are the only awaits in the hot path.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use darwin_feed::FrameReceiver;

use crate::cache::CancellationCache;
use crate::enrichment::EnrichmentEngine;

/// Runs until `frames_rx` closes (the subscriber task has shut down).
/// `decoded_total` counts every frame received on the channel, regardless
/// of whether it carries a cancellation; `cancellations_total` (tracked
/// inside `EnrichmentEngine`) counts only the cancellation events a frame
/// decodes into. `frames_rx` drops the oldest queued frame on overflow
/// rather than blocking the subscriber, so every drop is folded into
/// `enrichment_failures_by_reason.store_error` here.
pub async fn run_pipeline(
    mut frames_rx: FrameReceiver,
    engine: Arc<EnrichmentEngine>,
    cache: Arc<CancellationCache>,
) {
    let mut last_drop_log = Instant::now() - Duration::from_secs(60);

    while let Some(frame) = frames_rx.recv().await {
        engine.stats.decoded_total.fetch_add(1, Ordering::Relaxed);

        let dropped = frames_rx.take_dropped();
        if dropped > 0 {
            engine.stats.failures_store_error.fetch_add(dropped, Ordering::Relaxed);
            if last_drop_log.elapsed() >= Duration::from_secs(60) {
                log::warn!(
                    "ingestion.pipeline: frame queue overflowed, dropped {dropped} oldest frame(s) to keep the latest signal"
                );
                last_drop_log = Instant::now();
            }
        }

        let events = match darwin_feed::decode_frame(&frame) {
            Ok(events) => events,
            Err(err) => {
                log::debug!("ingestion.pipeline: malformed frame dropped: {err}");
                continue;
            }
        };

        for event in events {
            let cancellation = engine.enrich(event).await;
            cache.insert(cancellation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::EnrichmentFailureReason;

    async fn open_test_store() -> (schedule_store::SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let store = schedule_store::SqliteStore::connect(&path).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn pipeline_counts_frames_and_cancellations_separately() {
        let (store, _dir) = open_test_store().await;
        let engine = Arc::new(EnrichmentEngine::new(store));
        let cache = Arc::new(CancellationCache::new(10, Duration::from_secs(86_400)));

        let (tx, rx) = darwin_feed::bounded_frame_channel(8);
        let handle = tokio::spawn(run_pipeline(rx, engine.clone(), cache.clone()));

        let frame_with_cancellation = r#"<Pport><uR><schedule rid="202512010000C99999" trainId="1A01">
            <cancelReason reasonCode="104">Signal failure</cancelReason>
        </schedule></uR></Pport>"#;
        let frame_without_cancellation = r#"<Pport><uR><TS rid="202512010000C12345" /></uR></Pport>"#;

        tx.push(frame_with_cancellation.to_string()).await;
        tx.push(frame_without_cancellation.to_string()).await;
        tx.close();

        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        let snapshot = engine.stats.snapshot();
        assert_eq!(snapshot.decoded_total, 2);
        assert_eq!(snapshot.cancellations_total, 1);
        assert_eq!(
            snapshot.enrichment_failures_by_reason.no_schedule,
            1,
            "cancellation references a schedule that was never imported"
        );

        let recent = cache.recent(10, None);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].rid, "202512010000C99999");
        let _ = EnrichmentFailureReason::NoSchedule;
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts_store_error() {
        let (store, _dir) = open_test_store().await;
        let engine = Arc::new(EnrichmentEngine::new(store));
        let cache = Arc::new(CancellationCache::new(10, Duration::from_secs(86_400)));

        let (tx, rx) = darwin_feed::bounded_frame_channel(1);
        let stale = r#"<Pport><uR><TS rid="202512010000C00001" /></uR></Pport>"#;
        let fresh = r#"<Pport><uR><TS rid="202512010000C00002" /></uR></Pport>"#;

        assert!(!tx.push(stale.to_string()).await);
        assert!(tx.push(fresh.to_string()).await, "second push should evict the first frame");
        tx.close();

        let handle = tokio::spawn(run_pipeline(rx, engine.clone(), cache.clone()));
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        let snapshot = engine.stats.snapshot();
        assert_eq!(snapshot.decoded_total, 1, "the dropped frame was never decoded");
        assert_eq!(
            snapshot.enrichment_failures_by_reason.store_error, 1,
            "the dropped frame should be counted as a back-pressure failure"
        );
    }
}
