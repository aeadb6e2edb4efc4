//! Persistent, indexed schedule store: the sole
//! authoritative, single-writer home for stations, aliases, TIPLOC
//! mappings, schedules, stops, connections, and the import-record log.
//! Every write is transactional per schedule/import; reads take a pool
//! connection and never hold it across network I/O above this crate.

pub mod queries;
pub mod resolver;

use std::path::Path;

use chrono::NaiveDate;
use model::{
    Connection, FileType, ImportOutcome, ImportRecord, ParseReport, Schedule, ScheduleStop,
    Station, StationAlias, TiplocMapping,
};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleResolution {
    Found(Schedule),
    NotFound,
    Ambiguous,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStatistics {
    pub schedule_count: i64,
    pub stop_count: i64,
    pub station_count: i64,
    pub last_import: Option<ImportRecord>,
    pub database_size_bytes: u64,
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    path: std::path::PathBuf,
}

impl SqliteStore {
    /// Opens (creating if absent) the SQLite file at `path` and runs any
    /// pending migrations. One file holds every Schedule Store entity plus
    /// the import-record log, per the system's persisted-state contract.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool, path: path.to_path_buf() })
    }

    pub async fn put_station(&self, station: &Station) -> Result<()> {
        queries::station::put_station(&self.pool, station).await
    }

    pub async fn put_alias(&self, alias: &StationAlias) -> Result<()> {
        queries::station::put_alias(&self.pool, alias).await
    }

    pub async fn put_mapping(&self, mapping: &TiplocMapping) -> Result<()> {
        queries::station::put_mapping(&self.pool, mapping).await
    }

    pub async fn put_schedule(&self, schedule: &Schedule, stops: &[ScheduleStop]) -> Result<i64> {
        queries::schedule::put_schedule(&self.pool, schedule, stops).await
    }

    pub async fn get_stops(&self, schedule_id: i64) -> Result<Vec<ScheduleStop>> {
        queries::schedule::get_stops(&self.pool, schedule_id).await
    }

    pub async fn lookup_station(&self, key: &str) -> Result<Option<Station>> {
        queries::station::lookup_station(&self.pool, key).await
    }

    /// Ranks the full station catalogue against `query` per the Station
    /// Resolver's contract and returns the top `limit` matches.
    pub async fn search_stations(&self, query: &str, limit: usize) -> Result<Vec<(Station, u8)>> {
        let candidates = queries::station::all_stations_with_aliases(&self.pool).await?;
        let mut ranked = resolver::rank(query, &candidates);
        ranked.truncate(limit);
        Ok(ranked)
    }

    pub async fn iter_schedules_active_on(&self, date: NaiveDate) -> Result<Vec<Schedule>> {
        queries::schedule::schedules_active_on(&self.pool, date).await
    }

    /// Resolves the schedule governing `train_uid` on `service_date`,
    /// applying STP precedence (`cancelled > overlay > new > permanent`).
    /// A governing `cancelled` row means no schedule is effectively active.
    pub async fn resolve_schedule(
        &self,
        train_uid: &str,
        service_date: NaiveDate,
    ) -> Result<ScheduleResolution> {
        let candidates = queries::schedule::schedules_for_train_uid(&self.pool, train_uid).await?;
        let active: Vec<Schedule> = candidates
            .into_iter()
            .filter(|schedule| schedule.active_on(service_date))
            .collect();
        if active.is_empty() {
            return Ok(ScheduleResolution::NotFound);
        }

        let max_precedence = active
            .iter()
            .map(|schedule| schedule.stp_indicator.precedence())
            .max()
            .expect("active is non-empty");

        if max_precedence == model::StpIndicator::Cancelled.precedence() {
            return Ok(ScheduleResolution::NotFound);
        }

        let mut governing: Vec<Schedule> = active
            .into_iter()
            .filter(|schedule| schedule.stp_indicator.precedence() == max_precedence)
            .collect();

        match governing.len() {
            1 => Ok(ScheduleResolution::Found(governing.remove(0))),
            _ => Ok(ScheduleResolution::Ambiguous),
        }
    }

    pub async fn put_connection(&self, connection: &Connection) -> Result<()> {
        sqlx::query(
            "INSERT INTO connections (from_tiploc, to_tiploc, mode, duration_minutes, valid_from, valid_to)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(from_tiploc, to_tiploc, mode) DO UPDATE SET
                duration_minutes = excluded.duration_minutes,
                valid_from = excluded.valid_from,
                valid_to = excluded.valid_to;",
        )
        .bind(&connection.from_tiploc)
        .bind(&connection.to_tiploc)
        .bind(match connection.mode {
            model::ConnectionMode::Walk => "walk",
            model::ConnectionMode::Interchange => "interchange",
        })
        .bind(connection.duration_minutes as i64)
        .bind(connection.valid_from.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(connection.valid_to.map(|d| d.format("%Y-%m-%d").to_string()))
        .execute(&self.pool)
        .await
        .map_err(queries::convert_error)?;
        Ok(())
    }

    pub async fn begin_import(
        &self,
        file_type: FileType,
        file_hash: &str,
    ) -> Result<(ImportOutcome, i64)> {
        queries::import::begin_import(&self.pool, file_type, file_hash).await
    }

    async fn finish_import(
        &self,
        row_id: i64,
        record_count: u64,
        records_imported: u64,
        success: bool,
        errors: &[String],
    ) -> Result<()> {
        queries::import::finish_import(&self.pool, row_id, record_count, records_imported, success, errors)
            .await
    }

    /// Drops schedules (and, via `ON DELETE CASCADE`, their stops) whose
    /// `end_date` is older than `retention_days` before today. Returns the
    /// number of schedules removed. Stations, aliases, and the import log
    /// are untouched — retention applies only to timetable data, per
    /// `store.retention_days`.
    pub async fn purge_schedules_older_than(&self, retention_days: u32) -> Result<u64> {
        let cutoff = chrono::Utc::now().date_naive() - chrono::Duration::days(retention_days as i64);
        let result = sqlx::query("DELETE FROM schedules WHERE end_date < ?1;")
            .bind(cutoff.format("%Y-%m-%d").to_string())
            .execute(&self.pool)
            .await
            .map_err(queries::convert_error)?;
        Ok(result.rows_affected())
    }

    pub async fn statistics(&self) -> Result<StoreStatistics> {
        let schedule_count = queries::schedule::schedule_count(&self.pool).await?;
        let stop_count = queries::schedule::stop_count(&self.pool).await?;
        let station_count = queries::schedule::station_count(&self.pool).await?;
        let last_import = queries::import::last_successful_import(&self.pool).await?;
        let database_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStatistics {
            schedule_count,
            stop_count,
            station_count,
            last_import,
            database_size_bytes,
        })
    }

    /// Imports a CIF-like schedule extract: hashes its content for the
    /// idempotency check, parses every schedule bundle, and persists each
    /// one. A `duplicate` outcome short-circuits without touching the store.
    pub async fn import_cif(&self, contents: &str) -> Result<(ImportOutcome, ParseReport)> {
        let hash = content_hash(contents.as_bytes());
        let (outcome, row_id) = self.begin_import(FileType::Cif, &hash).await?;
        if outcome == ImportOutcome::Duplicate {
            return Ok((outcome, ParseReport::default()));
        }

        let (parsed, report) = format_adapters::cif::parse(contents);
        let mut imported = 0u64;
        let mut errors: Vec<String> = report.parse_errors.iter().map(|e| e.reason.clone()).collect();

        for schedule in &parsed {
            match self.put_schedule(&schedule.schedule, &schedule.stops).await {
                Ok(_) => imported += 1,
                Err(e) => errors.push(e.to_string()),
            }
        }

        let success = errors.is_empty();
        self.finish_import(row_id, report.record_count, imported, success, &errors)
            .await?;
        Ok((outcome, report))
    }

    pub async fn import_msn(&self, contents: &str) -> Result<(ImportOutcome, ParseReport)> {
        let hash = content_hash(contents.as_bytes());
        let (outcome, row_id) = self.begin_import(FileType::Msn, &hash).await?;
        if outcome == ImportOutcome::Duplicate {
            return Ok((outcome, ParseReport::default()));
        }

        let (stations, report) = format_adapters::msn::parse(contents);
        let mut imported = 0u64;
        let mut errors: Vec<String> = report.parse_errors.iter().map(|e| e.reason.clone()).collect();

        for station in &stations {
            match self.put_station(station).await {
                Ok(_) => imported += 1,
                Err(e) => errors.push(e.to_string()),
            }
        }

        let success = errors.is_empty();
        self.finish_import(row_id, report.record_count, imported, success, &errors)
            .await?;
        Ok((outcome, report))
    }

    pub async fn import_alf(&self, contents: &str) -> Result<(ImportOutcome, ParseReport)> {
        let hash = content_hash(contents.as_bytes());
        let (outcome, row_id) = self.begin_import(FileType::Alf, &hash).await?;
        if outcome == ImportOutcome::Duplicate {
            return Ok((outcome, ParseReport::default()));
        }

        let (connections, report) = format_adapters::alf::parse(contents);
        let mut imported = 0u64;
        let mut errors: Vec<String> = report.parse_errors.iter().map(|e| e.reason.clone()).collect();

        for connection in &connections {
            match self.put_connection(connection).await {
                Ok(_) => imported += 1,
                Err(e) => errors.push(e.to_string()),
            }
        }

        let success = errors.is_empty();
        self.finish_import(row_id, report.record_count, imported, success, &errors)
            .await?;
        Ok((outcome, report))
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::{DaysRun, ServiceType, StopType, StpIndicator};

    async fn open_test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let store = SqliteStore::connect(&path).await.unwrap();
        (store, dir)
    }

    fn schedule(train_uid: &str, start: &str, end: &str, stp: StpIndicator) -> Schedule {
        Schedule {
            schedule_id: 0,
            train_uid: train_uid.to_string(),
            headcode: Some("2A11".to_string()),
            operator_code: Some("VT".to_string()),
            service_type: ServiceType::Passenger,
            start_date: NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
            end_date: NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
            days_run: DaysRun::from_cif_str("1111100").unwrap(),
            stp_indicator: stp,
            speed: None,
            seating_class: None,
            sleepers: None,
            reservations: None,
            catering: None,
        }
    }

    fn stop(tiploc: &str, stop_type: StopType) -> ScheduleStop {
        ScheduleStop {
            schedule_id: 0,
            sequence: 0,
            tiploc: tiploc.to_string(),
            stop_type,
            arrival_time: None,
            departure_time: None,
            pass_time: None,
            platform: None,
            activities: None,
        }
    }

    #[tokio::test]
    async fn import_is_idempotent_on_content_hash() {
        let (store, _dir) = open_test_store().await;
        let cif = "BSNC123452512012512011111100    2A11                     100      BSR        C100P\nLOEUSTON  1800 1   1         TB          \nLTBHAMNS  1935     2     TF          ";

        let (first, _) = store.import_cif(cif).await.unwrap();
        assert_eq!(first, ImportOutcome::Accept);

        let (second, _) = store.import_cif(cif).await.unwrap();
        assert_eq!(second, ImportOutcome::Duplicate);

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.schedule_count, 1);
    }

    #[tokio::test]
    async fn stp_overlay_wins_over_permanent() {
        let (store, _dir) = open_test_store().await;

        let permanent = schedule("T1", "2025-12-01", "2025-12-07", StpIndicator::Permanent);
        store
            .put_schedule(
                &permanent,
                &[stop("A", StopType::Origin), stop("Z", StopType::Terminus)],
            )
            .await
            .unwrap();

        let overlay = schedule("T1", "2025-12-03", "2025-12-03", StpIndicator::Overlay);
        store
            .put_schedule(
                &overlay,
                &[stop("APRIME", StopType::Origin), stop("Z", StopType::Terminus)],
            )
            .await
            .unwrap();

        let date = NaiveDate::parse_from_str("2025-12-03", "%Y-%m-%d").unwrap();
        let resolution = store.resolve_schedule("T1", date).await.unwrap();
        match resolution {
            ScheduleResolution::Found(resolved) => {
                assert_eq!(resolved.stp_indicator, StpIndicator::Overlay);
            }
            other => panic!("expected Found(overlay), got {other:?}"),
        }

        let other_date = NaiveDate::parse_from_str("2025-12-01", "%Y-%m-%d").unwrap();
        let resolution = store.resolve_schedule("T1", other_date).await.unwrap();
        match resolution {
            ScheduleResolution::Found(resolved) => {
                assert_eq!(resolved.stp_indicator, StpIndicator::Permanent);
            }
            other => panic!("expected Found(permanent), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_stops_preserves_sequence_order() {
        let (store, _dir) = open_test_store().await;
        let sched = schedule("T2", "2025-12-01", "2025-12-01", StpIndicator::Permanent);
        let mut stops = vec![
            stop("A", StopType::Origin),
            stop("B", StopType::Intermediate),
            stop("C", StopType::Terminus),
        ];
        for (idx, s) in stops.iter_mut().enumerate() {
            s.sequence = idx as u32;
        }
        let schedule_id = store.put_schedule(&sched, &stops).await.unwrap();
        let fetched = store.get_stops(schedule_id).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert!(fetched.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn search_stations_finds_exact_name() {
        let (store, _dir) = open_test_store().await;
        store
            .put_station(&Station {
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

        let results = store.search_stations("London Euston", 5).await.unwrap();
        assert_eq!(results[0].0.tiploc, "EUSTON");
        assert_eq!(results[0].1, 95);
    }
}
