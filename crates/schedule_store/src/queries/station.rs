use model::{Station, StationAlias, StationAliasType, TiplocMapping};
use sqlx::SqlitePool;

use super::convert_error;
use crate::resolver::StationWithAliases;
use crate::Result;

#[derive(sqlx::FromRow)]
struct StationRow {
    tiploc: String,
    crs_code: Option<String>,
    station_name: String,
    country: Option<String>,
    region: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_active: bool,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station {
            tiploc: row.tiploc,
            crs_code: row.crs_code,
            station_name: row.station_name,
            country: row.country,
            region: row.region,
            latitude: row.latitude,
            longitude: row.longitude,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AliasRow {
    station_tiploc: String,
    alias_name: String,
    alias_type: String,
    is_primary: bool,
}

fn alias_type_from_str(raw: &str) -> StationAliasType {
    match raw {
        "official" => StationAliasType::Official,
        "historical" => StationAliasType::Historical,
        "colloquial" => StationAliasType::Colloquial,
        _ => StationAliasType::Common,
    }
}

fn alias_type_to_str(alias_type: StationAliasType) -> &'static str {
    match alias_type {
        StationAliasType::Common => "common",
        StationAliasType::Official => "official",
        StationAliasType::Historical => "historical",
        StationAliasType::Colloquial => "colloquial",
    }
}

impl From<AliasRow> for StationAlias {
    fn from(row: AliasRow) -> Self {
        StationAlias {
            station_tiploc: row.station_tiploc,
            alias_name: row.alias_name,
            alias_type: alias_type_from_str(&row.alias_type),
            is_primary: row.is_primary,
        }
    }
}

pub async fn put_station(pool: &SqlitePool, station: &Station) -> Result<()> {
    let station = station.clone().normalized();
    sqlx::query(
        "INSERT INTO stations (tiploc, crs_code, station_name, country, region, latitude, longitude, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(tiploc) DO UPDATE SET
            crs_code = excluded.crs_code,
            station_name = excluded.station_name,
            country = excluded.country,
            region = excluded.region,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            is_active = excluded.is_active;",
    )
    .bind(&station.tiploc)
    .bind(&station.crs_code)
    .bind(&station.station_name)
    .bind(&station.country)
    .bind(&station.region)
    .bind(station.latitude)
    .bind(station.longitude)
    .bind(station.is_active)
    .execute(pool)
    .await
    .map_err(convert_error)?;
    Ok(())
}

pub async fn put_alias(pool: &SqlitePool, alias: &StationAlias) -> Result<()> {
    sqlx::query(
        "INSERT INTO station_aliases (station_tiploc, alias_name, alias_type, is_primary)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(station_tiploc, alias_name) DO UPDATE SET
            alias_type = excluded.alias_type,
            is_primary = excluded.is_primary;",
    )
    .bind(&alias.station_tiploc)
    .bind(&alias.alias_name)
    .bind(alias_type_to_str(alias.alias_type))
    .bind(alias.is_primary)
    .execute(pool)
    .await
    .map_err(convert_error)?;
    Ok(())
}

pub async fn put_mapping(pool: &SqlitePool, mapping: &TiplocMapping) -> Result<()> {
    sqlx::query(
        "INSERT INTO tiploc_mappings (source_tiploc, data_source, canonical_tiploc, reason)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(source_tiploc, data_source) DO UPDATE SET
            canonical_tiploc = excluded.canonical_tiploc,
            reason = excluded.reason;",
    )
    .bind(&mapping.source_tiploc)
    .bind(&mapping.data_source)
    .bind(&mapping.canonical_tiploc)
    .bind(&mapping.reason)
    .execute(pool)
    .await
    .map_err(convert_error)?;
    Ok(())
}

/// Canonicalizes `tiploc` via any recorded `TiplocMapping`, returning the
/// input unchanged if no mapping exists for it.
pub async fn canonicalize_tiploc(pool: &SqlitePool, tiploc: &str) -> Result<String> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT canonical_tiploc FROM tiploc_mappings WHERE source_tiploc = ?1 LIMIT 1;",
    )
    .bind(tiploc)
    .fetch_optional(pool)
    .await
    .map_err(convert_error)?;
    Ok(row.map(|(canonical,)| canonical).unwrap_or_else(|| tiploc.to_string()))
}

pub async fn lookup_station(pool: &SqlitePool, key: &str) -> Result<Option<Station>> {
    let canonical = canonicalize_tiploc(pool, key).await?;
    let row: Option<StationRow> = sqlx::query_as(
        "SELECT tiploc, crs_code, station_name, country, region, latitude, longitude, is_active
         FROM stations
         WHERE tiploc = ?1
            OR UPPER(crs_code) = UPPER(?1)
            OR LOWER(station_name) = LOWER(?1)
            OR tiploc IN (SELECT station_tiploc FROM station_aliases WHERE LOWER(alias_name) = LOWER(?1))
         LIMIT 1;",
    )
    .bind(&canonical)
    .fetch_optional(pool)
    .await
    .map_err(convert_error)?;
    Ok(row.map(Station::from))
}

pub async fn all_stations_with_aliases(pool: &SqlitePool) -> Result<Vec<StationWithAliases>> {
    let station_rows: Vec<StationRow> = sqlx::query_as(
        "SELECT tiploc, crs_code, station_name, country, region, latitude, longitude, is_active FROM stations;",
    )
    .fetch_all(pool)
    .await
    .map_err(convert_error)?;

    let alias_rows: Vec<AliasRow> = sqlx::query_as(
        "SELECT station_tiploc, alias_name, alias_type, is_primary FROM station_aliases;",
    )
    .fetch_all(pool)
    .await
    .map_err(convert_error)?;

    let mut out = Vec::with_capacity(station_rows.len());
    for station_row in station_rows {
        let tiploc = station_row.tiploc.clone();
        let aliases = alias_rows
            .iter()
            .filter(|row| row.station_tiploc == tiploc)
            .map(|row| StationAlias {
                station_tiploc: row.station_tiploc.clone(),
                alias_name: row.alias_name.clone(),
                alias_type: alias_type_from_str(&row.alias_type),
                is_primary: row.is_primary,
            })
            .collect();
        out.push(StationWithAliases {
            station: Station::from(station_row),
            aliases,
        });
    }
    Ok(out)
}
