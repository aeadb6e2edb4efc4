use chrono::NaiveDate;
use model::{DaysRun, Schedule, ScheduleStop, ServiceType, StopType, StpIndicator};
use sqlx::SqlitePool;

use super::convert_error;
use crate::Result;

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    schedule_id: i64,
    train_uid: String,
    headcode: Option<String>,
    operator_code: Option<String>,
    service_type: String,
    start_date: String,
    end_date: String,
    days_run: i64,
    stp_indicator: String,
    speed: Option<i64>,
    seating_class: Option<String>,
    sleepers: Option<String>,
    reservations: Option<String>,
    catering: Option<String>,
}

fn service_type_from_str(raw: &str) -> ServiceType {
    match raw {
        "freight" => ServiceType::Freight,
        "other" => ServiceType::Other,
        _ => ServiceType::Passenger,
    }
}

fn service_type_to_str(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Passenger => "passenger",
        ServiceType::Freight => "freight",
        ServiceType::Other => "other",
    }
}

fn stp_from_str(raw: &str) -> StpIndicator {
    match raw {
        "new" => StpIndicator::New,
        "overlay" => StpIndicator::Overlay,
        "cancelled" => StpIndicator::Cancelled,
        _ => StpIndicator::Permanent,
    }
}

fn stp_to_str(stp: StpIndicator) -> &'static str {
    match stp {
        StpIndicator::Permanent => "permanent",
        StpIndicator::New => "new",
        StpIndicator::Overlay => "overlay",
        StpIndicator::Cancelled => "cancelled",
    }
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = String;

    fn try_from(row: ScheduleRow) -> std::result::Result<Self, Self::Error> {
        Ok(Schedule {
            schedule_id: row.schedule_id,
            train_uid: row.train_uid,
            headcode: row.headcode,
            operator_code: row.operator_code,
            service_type: service_type_from_str(&row.service_type),
            start_date: NaiveDate::parse_from_str(&row.start_date, "%Y-%m-%d")
                .map_err(|e| e.to_string())?,
            end_date: NaiveDate::parse_from_str(&row.end_date, "%Y-%m-%d")
                .map_err(|e| e.to_string())?,
            days_run: DaysRun::from_bits_truncate(row.days_run as u8),
            stp_indicator: stp_from_str(&row.stp_indicator),
            speed: row.speed.map(|v| v as u16),
            seating_class: row.seating_class,
            sleepers: row.sleepers,
            reservations: row.reservations,
            catering: row.catering,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StopRow {
    schedule_id: i64,
    sequence: i64,
    tiploc: String,
    stop_type: String,
    arrival_time: Option<String>,
    departure_time: Option<String>,
    pass_time: Option<String>,
    platform: Option<String>,
    activities: Option<String>,
}

fn stop_type_from_str(raw: &str) -> StopType {
    match raw {
        "intermediate" => StopType::Intermediate,
        "terminus" => StopType::Terminus,
        "pass" => StopType::Pass,
        _ => StopType::Origin,
    }
}

fn stop_type_to_str(stop_type: StopType) -> &'static str {
    match stop_type {
        StopType::Origin => "origin",
        StopType::Intermediate => "intermediate",
        StopType::Terminus => "terminus",
        StopType::Pass => "pass",
    }
}

impl From<StopRow> for ScheduleStop {
    fn from(row: StopRow) -> Self {
        ScheduleStop {
            schedule_id: row.schedule_id,
            sequence: row.sequence as u32,
            tiploc: row.tiploc,
            stop_type: stop_type_from_str(&row.stop_type),
            arrival_time: row.arrival_time,
            departure_time: row.departure_time,
            pass_time: row.pass_time,
            platform: row.platform,
            activities: row.activities,
        }
    }
}

/// Inserts a schedule and its stops in one transaction. Returns the
/// assigned `schedule_id`. STP precedence among schedules sharing a
/// `train_uid` is resolved at read time, not by mutating prior rows here —
/// an overlay or cancellation is simply a higher-precedence row competing
/// for the same dates.
pub async fn put_schedule(
    pool: &SqlitePool,
    schedule: &Schedule,
    stops: &[ScheduleStop],
) -> Result<i64> {
    let mut tx = pool.begin().await.map_err(convert_error)?;

    let schedule_id: i64 = sqlx::query_scalar(
        "INSERT INTO schedules
            (train_uid, headcode, operator_code, service_type, start_date, end_date,
             days_run, stp_indicator, speed, seating_class, sleepers, reservations, catering)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(train_uid, start_date, stp_indicator) DO UPDATE SET
            headcode = excluded.headcode,
            operator_code = excluded.operator_code,
            service_type = excluded.service_type,
            end_date = excluded.end_date,
            days_run = excluded.days_run,
            speed = excluded.speed,
            seating_class = excluded.seating_class,
            sleepers = excluded.sleepers,
            reservations = excluded.reservations,
            catering = excluded.catering
         RETURNING schedule_id;",
    )
    .bind(&schedule.train_uid)
    .bind(&schedule.headcode)
    .bind(&schedule.operator_code)
    .bind(service_type_to_str(schedule.service_type))
    .bind(schedule.start_date.format("%Y-%m-%d").to_string())
    .bind(schedule.end_date.format("%Y-%m-%d").to_string())
    .bind(schedule.days_run.bits() as i64)
    .bind(stp_to_str(schedule.stp_indicator))
    .bind(schedule.speed.map(|v| v as i64))
    .bind(&schedule.seating_class)
    .bind(&schedule.sleepers)
    .bind(&schedule.reservations)
    .bind(&schedule.catering)
    .fetch_one(&mut *tx)
    .await
    .map_err(convert_error)?;

    sqlx::query("DELETE FROM schedule_stops WHERE schedule_id = ?1;")
        .bind(schedule_id)
        .execute(&mut *tx)
        .await
        .map_err(convert_error)?;

    for stop in stops {
        sqlx::query(
            "INSERT INTO schedule_stops
                (schedule_id, sequence, tiploc, stop_type, arrival_time, departure_time, pass_time, platform, activities)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        )
        .bind(schedule_id)
        .bind(stop.sequence as i64)
        .bind(&stop.tiploc)
        .bind(stop_type_to_str(stop.stop_type))
        .bind(&stop.arrival_time)
        .bind(&stop.departure_time)
        .bind(&stop.pass_time)
        .bind(&stop.platform)
        .bind(&stop.activities)
        .execute(&mut *tx)
        .await
        .map_err(convert_error)?;
    }

    tx.commit().await.map_err(convert_error)?;
    Ok(schedule_id)
}

pub async fn get_stops(pool: &SqlitePool, schedule_id: i64) -> Result<Vec<ScheduleStop>> {
    let rows: Vec<StopRow> = sqlx::query_as(
        "SELECT schedule_id, sequence, tiploc, stop_type, arrival_time, departure_time, pass_time, platform, activities
         FROM schedule_stops WHERE schedule_id = ?1 ORDER BY sequence ASC;",
    )
    .bind(schedule_id)
    .fetch_all(pool)
    .await
    .map_err(convert_error)?;
    Ok(rows.into_iter().map(ScheduleStop::from).collect())
}

/// All schedule rows sharing `train_uid`, regardless of date range — the
/// caller applies `Schedule::active_on` and STP precedence.
pub async fn schedules_for_train_uid(pool: &SqlitePool, train_uid: &str) -> Result<Vec<Schedule>> {
    let rows: Vec<ScheduleRow> = sqlx::query_as(
        "SELECT schedule_id, train_uid, headcode, operator_code, service_type, start_date, end_date,
                days_run, stp_indicator, speed, seating_class, sleepers, reservations, catering
         FROM schedules WHERE train_uid = ?1;",
    )
    .bind(train_uid)
    .fetch_all(pool)
    .await
    .map_err(convert_error)?;

    rows.into_iter()
        .filter_map(|row| Schedule::try_from(row).ok())
        .map(Ok)
        .collect()
}

pub async fn schedules_active_on(pool: &SqlitePool, date: NaiveDate) -> Result<Vec<Schedule>> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let rows: Vec<ScheduleRow> = sqlx::query_as(
        "SELECT schedule_id, train_uid, headcode, operator_code, service_type, start_date, end_date,
                days_run, stp_indicator, speed, seating_class, sleepers, reservations, catering
         FROM schedules WHERE start_date <= ?1 AND end_date >= ?1;",
    )
    .bind(&date_str)
    .fetch_all(pool)
    .await
    .map_err(convert_error)?;

    Ok(rows
        .into_iter()
        .filter_map(|row| Schedule::try_from(row).ok())
        .filter(|schedule| schedule.active_on(date))
        .collect())
}

pub async fn schedule_count(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM schedules;")
        .fetch_one(pool)
        .await
        .map_err(convert_error)
}

pub async fn stop_count(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM schedule_stops;")
        .fetch_one(pool)
        .await
        .map_err(convert_error)
}

pub async fn station_count(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM stations;")
        .fetch_one(pool)
        .await
        .map_err(convert_error)
}
