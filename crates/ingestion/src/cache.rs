//! Cancellation Cache: a bounded, ordered, in-memory store of recent
//! cancellations, built around a `parking_lot` lock over a plain
//! `VecDeque` rather than a dedicated cache crate — the lock here is held
//! only across the insert and its eviction sweep, never across network or
//! store I/O.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use model::ActiveCancellation;
use parking_lot::RwLock;

#[derive(Debug, Clone, serde::Serialize)]
pub struct RouteSummary {
    pub origin: String,
    pub destination: String,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub total: u64,
    pub enriched: u64,
    pub non_enriched: u64,
    pub enrichment_rate: f64,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
}

pub struct CancellationCache {
    entries: RwLock<VecDeque<ActiveCancellation>>,
    max_entries: usize,
    max_age: chrono::Duration,
}

impl CancellationCache {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries.min(4096))),
            max_entries,
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::hours(24)),
        }
    }

    /// Inserts `cancellation`, then evicts whatever is now out of bounds
    /// (oldest-first) under the same exclusive lock, so a reader never
    /// observes a window wider than either bound allows.
    pub fn insert(&self, cancellation: ActiveCancellation) {
        let mut entries = self.entries.write();
        entries.push_back(cancellation);

        while entries.len() > self.max_entries {
            entries.pop_front();
        }

        let cutoff = Utc::now() - self.max_age;
        while matches!(entries.front(), Some(front) if front.observed_at < cutoff) {
            entries.pop_front();
        }
    }

    /// Newest-first, optionally only those observed at or after `since`,
    /// capped at `limit`.
    pub fn recent(&self, limit: usize, since: Option<DateTime<Utc>>) -> Vec<ActiveCancellation> {
        let entries = self.entries.read();
        entries
            .iter()
            .rev()
            .filter(|c| since.map(|since| c.observed_at >= since).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn enriched(&self, limit: usize, since: Option<DateTime<Utc>>) -> Vec<ActiveCancellation> {
        let entries = self.entries.read();
        entries
            .iter()
            .rev()
            .filter(|c| c.darwin_enriched)
            .filter(|c| since.map(|since| c.observed_at >= since).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Aggregates enriched rows by `(origin, destination)`, sorted by
    /// descending count. Non-enriched rows have no route and never
    /// contribute.
    pub fn by_route(&self) -> Vec<RouteSummary> {
        let entries = self.entries.read();
        let mut tally: HashMap<(String, String), (u64, DateTime<Utc>)> = HashMap::new();

        for entry in entries.iter() {
            let Some((origin, destination)) = entry.route() else {
                continue;
            };
            let key = (origin.to_string(), destination.to_string());
            let slot = tally.entry(key).or_insert((0, entry.observed_at));
            slot.0 += 1;
            if entry.observed_at > slot.1 {
                slot.1 = entry.observed_at;
            }
        }

        let mut summaries: Vec<RouteSummary> = tally
            .into_iter()
            .map(|((origin, destination), (count, last_seen))| RouteSummary {
                origin,
                destination,
                count,
                last_seen,
            })
            .collect();
        summaries.sort_by(|a, b| b.count.cmp(&a.count));
        summaries
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let total = entries.len() as u64;
        let enriched = entries.iter().filter(|c| c.darwin_enriched).count() as u64;
        let non_enriched = total - enriched;
        let enrichment_rate = if total == 0 {
            0.0
        } else {
            enriched as f64 / total as f64
        };
        CacheStats {
            total,
            enriched,
            non_enriched,
            enrichment_rate,
            window_start: entries.front().map(|c| c.observed_at),
            window_end: entries.back().map(|c| c.observed_at),
        }
    }

    pub fn purge_older_than(&self, age: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        let mut entries = self.entries.write();
        while matches!(entries.front(), Some(front) if front.observed_at < cutoff) {
            entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::DecodedEvent;

    fn unenriched_at(rid: &str, observed_at: DateTime<Utc>) -> ActiveCancellation {
        let mut c = ActiveCancellation::unenriched(DecodedEvent {
            rid: rid.to_string(),
            train_service_code: None,
            reason_code: None,
            reason_text: None,
            received_at: observed_at,
        });
        c.observed_at = observed_at;
        c
    }

    #[test]
    fn evicts_oldest_first_at_capacity() {
        let cache = CancellationCache::new(3, Duration::from_secs(86_400));
        let t0 = Utc::now();
        for i in 0..4 {
            cache.insert(unenriched_at(&format!("r{i}"), t0 + chrono::Duration::seconds(i)));
        }

        let recent = cache.recent(10, None);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].rid, "r3");
        assert_eq!(recent[2].rid, "r1");
    }

    #[test]
    fn recent_preserves_newest_first_order() {
        let cache = CancellationCache::new(10, Duration::from_secs(86_400));
        let t0 = Utc::now();
        cache.insert(unenriched_at("a", t0));
        cache.insert(unenriched_at("b", t0 + chrono::Duration::seconds(1)));
        cache.insert(unenriched_at("c", t0 + chrono::Duration::seconds(2)));

        let recent = cache.recent(10, None);
        assert_eq!(recent.iter().map(|c| c.rid.as_str()).collect::<Vec<_>>(), vec!["c", "b", "a"]);
    }

    #[test]
    fn stats_reconcile_with_by_route_count() {
        let cache = CancellationCache::new(10, Duration::from_secs(86_400));
        let event = DecodedEvent {
            rid: "enriched1".to_string(),
            train_service_code: None,
            reason_code: None,
            reason_text: None,
            received_at: Utc::now(),
        };
        let mut enriched = ActiveCancellation::unenriched(event);
        enriched.darwin_enriched = true;
        enriched.origin = Some(model::OriginStop {
            tiploc: "EUSTON".to_string(),
            station_name: None,
            scheduled_departure: "18:00".to_string(),
            platform: None,
        });
        enriched.destination = Some(model::DestinationStop {
            tiploc: "BHAMNS".to_string(),
            station_name: None,
            scheduled_arrival: "19:35".to_string(),
            platform: None,
        });
        cache.insert(enriched);
        cache.insert(unenriched_at("miss1", Utc::now()));

        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.enriched, 1);
        assert_eq!(stats.non_enriched, 1);

        let by_route = cache.by_route();
        let routed_total: u64 = by_route.iter().map(|r| r.count).sum();
        assert!(routed_total <= stats.enriched);
        assert_eq!(routed_total, 1);
    }

    #[test]
    fn purge_older_than_drops_stale_entries() {
        let cache = CancellationCache::new(10, Duration::from_secs(86_400));
        cache.insert(unenriched_at("old", Utc::now() - chrono::Duration::hours(2)));
        cache.insert(unenriched_at("new", Utc::now()));

        cache.purge_older_than(Duration::from_secs(3600));

        let recent = cache.recent(10, None);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].rid, "new");
    }
}
