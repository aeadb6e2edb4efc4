//! Enrichment Engine: correlates a decoded cancellation against the
//! Schedule Store and assembles the enriched record. The counter style —
//! a handful of named atomics, checked and bumped inline, no metrics
//! registry — matches `deutsche_bahn::client`'s own counter bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};

use model::{
    ActiveCancellation, CallingPoint, CancellationCategory, DecodedEvent, DestinationStop,
    EnrichmentFailureReason, OriginStop, StopType, StpIndicator,
};
use schedule_store::{ScheduleResolution, SqliteStore};

/// Atomic counters backing `/cancellations/stats` and `/metrics`. Each
/// field is updated independently; no lock is needed since every counter
/// is written by the single enrichment task and read by many.
#[derive(Default)]
pub struct EnrichmentStats {
    pub decoded_total: AtomicU64,
    pub cancellations_total: AtomicU64,
    pub enriched_total: AtomicU64,
    pub failures_no_rid: AtomicU64,
    pub failures_no_schedule: AtomicU64,
    pub failures_ambiguous: AtomicU64,
    pub failures_store_error: AtomicU64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrichmentStatsSnapshot {
    pub decoded_total: u64,
    pub cancellations_total: u64,
    pub enriched_total: u64,
    pub enrichment_failures_by_reason: EnrichmentFailuresSnapshot,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrichmentFailuresSnapshot {
    pub no_rid: u64,
    pub no_schedule: u64,
    pub ambiguous: u64,
    pub store_error: u64,
}

impl EnrichmentStats {
    fn record_failure(&self, reason: EnrichmentFailureReason) {
        let counter = match reason {
            EnrichmentFailureReason::NoRid => &self.failures_no_rid,
            EnrichmentFailureReason::NoSchedule => &self.failures_no_schedule,
            EnrichmentFailureReason::Ambiguous => &self.failures_ambiguous,
            EnrichmentFailureReason::StoreError => &self.failures_store_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EnrichmentStatsSnapshot {
        EnrichmentStatsSnapshot {
            decoded_total: self.decoded_total.load(Ordering::Relaxed),
            cancellations_total: self.cancellations_total.load(Ordering::Relaxed),
            enriched_total: self.enriched_total.load(Ordering::Relaxed),
            enrichment_failures_by_reason: EnrichmentFailuresSnapshot {
                no_rid: self.failures_no_rid.load(Ordering::Relaxed),
                no_schedule: self.failures_no_schedule.load(Ordering::Relaxed),
                ambiguous: self.failures_ambiguous.load(Ordering::Relaxed),
                store_error: self.failures_store_error.load(Ordering::Relaxed),
            },
        }
    }
}

pub struct EnrichmentEngine {
    store: SqliteStore,
    pub stats: EnrichmentStats,
}

impl EnrichmentEngine {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store,
            stats: EnrichmentStats::default(),
        }
    }

    /// Turns a decoded cancellation into an `ActiveCancellation`, touching
    /// the Schedule Store only through read operations (`resolve_schedule`,
    /// `get_stops`, `lookup_station`) — enrichment never writes.
    pub async fn enrich(&self, event: DecodedEvent) -> ActiveCancellation {
        self.stats.cancellations_total.fetch_add(1, Ordering::Relaxed);

        let Some((service_date, train_uid)) = event.service_date_and_uid() else {
            self.stats.record_failure(EnrichmentFailureReason::NoRid);
            return ActiveCancellation::unenriched(event);
        };

        let resolution = match self.store.resolve_schedule(train_uid, service_date).await {
            Ok(resolution) => resolution,
            Err(_) => {
                self.stats.record_failure(EnrichmentFailureReason::StoreError);
                return ActiveCancellation::unenriched(event);
            }
        };

        let schedule = match resolution {
            ScheduleResolution::Found(schedule) => schedule,
            ScheduleResolution::NotFound => {
                self.stats.record_failure(EnrichmentFailureReason::NoSchedule);
                return ActiveCancellation::unenriched(event);
            }
            ScheduleResolution::Ambiguous => {
                self.stats.record_failure(EnrichmentFailureReason::Ambiguous);
                return ActiveCancellation::unenriched(event);
            }
        };

        let stops = match self.store.get_stops(schedule.schedule_id).await {
            Ok(stops) => stops,
            Err(_) => {
                self.stats.record_failure(EnrichmentFailureReason::StoreError);
                return ActiveCancellation::unenriched(event);
            }
        };

        let Some(origin_stop) = stops.iter().find(|s| s.stop_type == StopType::Origin) else {
            self.stats.record_failure(EnrichmentFailureReason::NoSchedule);
            return ActiveCancellation::unenriched(event);
        };
        let Some(destination_stop) = stops.iter().find(|s| s.stop_type == StopType::Terminus) else {
            self.stats.record_failure(EnrichmentFailureReason::NoSchedule);
            return ActiveCancellation::unenriched(event);
        };

        let origin = OriginStop {
            tiploc: origin_stop.tiploc.clone(),
            station_name: self.station_name(&origin_stop.tiploc).await,
            scheduled_departure: origin_stop.departure_time.clone().unwrap_or_default(),
            platform: origin_stop.platform.clone(),
        };
        let destination = DestinationStop {
            tiploc: destination_stop.tiploc.clone(),
            station_name: self.station_name(&destination_stop.tiploc).await,
            scheduled_arrival: destination_stop.arrival_time.clone().unwrap_or_default(),
            platform: destination_stop.platform.clone(),
        };

        let mut calling_points = Vec::new();
        for stop in stops
            .iter()
            .filter(|s| s.stop_type == StopType::Intermediate || s.stop_type == StopType::Pass)
        {
            calling_points.push(CallingPoint {
                tiploc: stop.tiploc.clone(),
                station_name: self.station_name(&stop.tiploc).await,
                arrival: stop.arrival_time.clone().or_else(|| stop.pass_time.clone()),
                departure: stop.departure_time.clone().or_else(|| stop.pass_time.clone()),
                platform: stop.platform.clone(),
            });
        }

        self.stats.enriched_total.fetch_add(1, Ordering::Relaxed);

        ActiveCancellation {
            rid: event.rid,
            train_service_code: event.train_service_code,
            reason_code: event.reason_code,
            reason_text: event.reason_text,
            observed_at: event.received_at,
            darwin_enriched: true,
            train_uid: Some(schedule.train_uid),
            headcode: schedule.headcode,
            operator_code: schedule.operator_code,
            service_date: Some(service_date),
            origin: Some(origin),
            destination: Some(destination),
            calling_points,
            category: Some(match schedule.stp_indicator {
                StpIndicator::Overlay | StpIndicator::Cancelled => CancellationCategory::ShortTerm,
                StpIndicator::Permanent | StpIndicator::New => CancellationCategory::Planned,
            }),
        }
    }

    async fn station_name(&self, tiploc: &str) -> Option<String> {
        self.store
            .lookup_station(tiploc)
            .await
            .ok()
            .flatten()
            .map(|station| station.station_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use model::{DaysRun, ServiceType};

    async fn open_test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let store = SqliteStore::connect(&path).await.unwrap();
        (store, dir)
    }

    fn event(rid: &str) -> DecodedEvent {
        DecodedEvent {
            rid: rid.to_string(),
            train_service_code: Some("2A11".to_string()),
            reason_code: Some("104".to_string()),
            reason_text: Some("Signal failure".to_string()),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn enriches_cancellation_with_schedule_context() {
        let (store, _dir) = open_test_store().await;
        store
            .put_station(&model::Station {
                tiploc: "EUSTON".to_string(),
                crs_code: Some("EUS".to_string()),
                station_name: "London Euston".to_string(),
                country: None,
                region: None,
                latitude: None,
                longitude: None,
                is_active: true,
            })
            .await
            .unwrap();

        let schedule = model::Schedule {
            schedule_id: 0,
            train_uid: "C12345".to_string(),
            headcode: Some("1A23".to_string()),
            operator_code: Some("VT".to_string()),
            service_type: ServiceType::Passenger,
            start_date: NaiveDate::parse_from_str("2025-12-01", "%Y-%m-%d").unwrap(),
            end_date: NaiveDate::parse_from_str("2025-12-01", "%Y-%m-%d").unwrap(),
            days_run: DaysRun::from_cif_str("1111100").unwrap(),
            stp_indicator: model::StpIndicator::Permanent,
            speed: None,
            seating_class: None,
            sleepers: None,
            reservations: None,
            catering: None,
        };
        let stops = vec![
            model::ScheduleStop {
                schedule_id: 0,
                sequence: 0,
                tiploc: "EUSTON".to_string(),
                stop_type: StopType::Origin,
                arrival_time: None,
                departure_time: Some("18:00".to_string()),
                pass_time: None,
                platform: None,
                activities: None,
            },
            model::ScheduleStop {
                schedule_id: 0,
                sequence: 1,
                tiploc: "MKTCENT".to_string(),
                stop_type: StopType::Intermediate,
                arrival_time: Some("18:25".to_string()),
                departure_time: Some("18:25".to_string()),
                pass_time: None,
                platform: None,
                activities: None,
            },
            model::ScheduleStop {
                schedule_id: 0,
                sequence: 2,
                tiploc: "BHAMNS".to_string(),
                stop_type: StopType::Terminus,
                arrival_time: Some("19:35".to_string()),
                departure_time: None,
                pass_time: None,
                platform: None,
                activities: None,
            },
        ];
        store.put_schedule(&schedule, &stops).await.unwrap();

        let engine = EnrichmentEngine::new(store);
        let result = engine.enrich(event("202512010000C12345")).await;

        assert!(result.darwin_enriched);
        assert_eq!(result.origin.as_ref().unwrap().tiploc, "EUSTON");
        assert_eq!(result.origin.as_ref().unwrap().station_name.as_deref(), Some("London Euston"));
        assert_eq!(result.origin.as_ref().unwrap().scheduled_departure, "18:00");
        assert_eq!(result.destination.as_ref().unwrap().tiploc, "BHAMNS");
        assert_eq!(result.calling_points.len(), 1);
        assert_eq!(result.calling_points[0].tiploc, "MKTCENT");
        assert_eq!(engine.stats.enriched_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn records_no_schedule_failure_on_miss() {
        let (store, _dir) = open_test_store().await;
        let engine = EnrichmentEngine::new(store);

        let result = engine.enrich(event("202512019999X99999")).await;

        assert!(!result.darwin_enriched);
        assert_eq!(engine.stats.failures_no_schedule.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn overlay_wins_over_permanent_during_enrichment() {
        let (store, _dir) = open_test_store().await;
        let permanent = model::Schedule {
            schedule_id: 0,
            train_uid: "T1".to_string(),
            headcode: None,
            operator_code: None,
            service_type: ServiceType::Passenger,
            start_date: NaiveDate::parse_from_str("2025-12-01", "%Y-%m-%d").unwrap(),
            end_date: NaiveDate::parse_from_str("2025-12-07", "%Y-%m-%d").unwrap(),
            days_run: DaysRun::from_cif_str("1111111").unwrap(),
            stp_indicator: model::StpIndicator::Permanent,
            speed: None,
            seating_class: None,
            sleepers: None,
            reservations: None,
            catering: None,
        };
        store
            .put_schedule(
                &permanent,
                &[
                    model::ScheduleStop {
                        schedule_id: 0,
                        sequence: 0,
                        tiploc: "A".to_string(),
                        stop_type: StopType::Origin,
                        arrival_time: None,
                        departure_time: Some("09:00".to_string()),
                        pass_time: None,
                        platform: None,
                        activities: None,
                    },
                    model::ScheduleStop {
                        schedule_id: 0,
                        sequence: 1,
                        tiploc: "Z".to_string(),
                        stop_type: StopType::Terminus,
                        arrival_time: Some("10:00".to_string()),
                        departure_time: None,
                        pass_time: None,
                        platform: None,
                        activities: None,
                    },
                ],
            )
            .await
            .unwrap();

        let mut overlay = permanent.clone();
        overlay.stp_indicator = model::StpIndicator::Overlay;
        overlay.start_date = NaiveDate::parse_from_str("2025-12-03", "%Y-%m-%d").unwrap();
        overlay.end_date = overlay.start_date;
        store
            .put_schedule(
                &overlay,
                &[
                    model::ScheduleStop {
                        schedule_id: 0,
                        sequence: 0,
                        tiploc: "APRIME".to_string(),
                        stop_type: StopType::Origin,
                        arrival_time: None,
                        departure_time: Some("09:30".to_string()),
                        pass_time: None,
                        platform: None,
                        activities: None,
                    },
                    model::ScheduleStop {
                        schedule_id: 0,
                        sequence: 1,
                        tiploc: "Z".to_string(),
                        stop_type: StopType::Terminus,
                        arrival_time: Some("10:30".to_string()),
                        departure_time: None,
                        pass_time: None,
                        platform: None,
                        activities: None,
                    },
                ],
            )
            .await
            .unwrap();

        let engine = EnrichmentEngine::new(store);
        let result = engine.enrich(event("202512030000T1")).await;

        assert!(result.darwin_enriched);
        assert_eq!(result.origin.as_ref().unwrap().tiploc, "APRIME");
    }
}
