use chrono::{DateTime, Utc};
use model::{FileType, ImportOutcome, ImportRecord};
use sqlx::SqlitePool;

use super::convert_error;
use crate::Result;

fn file_type_to_str(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Cif => "cif",
        FileType::Msn => "msn",
        FileType::Alf => "alf",
    }
}

fn file_type_from_str(raw: &str) -> FileType {
    match raw {
        "msn" => FileType::Msn,
        "alf" => FileType::Alf,
        _ => FileType::Cif,
    }
}

#[derive(sqlx::FromRow)]
struct ImportRow {
    id: i64,
    file_type: String,
    file_hash: String,
    sequence_number: i64,
    record_count: i64,
    records_imported: i64,
    started_at: String,
    finished_at: Option<String>,
    success: bool,
    errors: String,
}

impl From<ImportRow> for ImportRecord {
    fn from(row: ImportRow) -> Self {
        ImportRecord {
            file_type: file_type_from_str(&row.file_type),
            file_hash: row.file_hash,
            sequence_number: row.sequence_number,
            record_count: row.record_count as u64,
            records_imported: row.records_imported as u64,
            started_at: DateTime::parse_from_rfc3339(&row.started_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            finished_at: row.finished_at.and_then(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            success: row.success,
            errors: serde_json::from_str(&row.errors).unwrap_or_default(),
        }
    }
}

/// Looks up any prior import of `file_hash` and decides the outcome per the
/// Schedule Store's idempotency contract, inserting a fresh `started`
/// bookkeeping row for `accept`/`replace`. Returns `(outcome, row_id)`; the
/// caller finishes the row via [`finish_import`] once parsing completes.
pub async fn begin_import(
    pool: &SqlitePool,
    file_type: FileType,
    file_hash: &str,
) -> Result<(ImportOutcome, i64)> {
    let existing: Option<ImportRow> = sqlx::query_as(
        "SELECT id, file_type, file_hash, sequence_number, record_count, records_imported,
                started_at, finished_at, success, errors
         FROM import_records WHERE file_hash = ?1;",
    )
    .bind(file_hash)
    .fetch_optional(pool)
    .await
    .map_err(convert_error)?;

    if let Some(row) = existing {
        if row.success {
            return Ok((ImportOutcome::Duplicate, row.id));
        }
        // Prior attempt at this exact content failed; retry under the same row.
        sqlx::query(
            "UPDATE import_records SET started_at = ?1, finished_at = NULL, success = 0
             WHERE id = ?2;",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(row.id)
        .execute(pool)
        .await
        .map_err(convert_error)?;
        return Ok((ImportOutcome::Replace, row.id));
    }

    let next_sequence: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM import_records;")
            .fetch_one(pool)
            .await
            .map_err(convert_error)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO import_records
            (file_type, file_hash, sequence_number, record_count, records_imported, started_at, finished_at, success, errors)
         VALUES (?1, ?2, ?3, 0, 0, ?4, NULL, 0, '[]')
         RETURNING id;",
    )
    .bind(file_type_to_str(file_type))
    .bind(file_hash)
    .bind(next_sequence)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await
    .map_err(convert_error)?;

    Ok((ImportOutcome::Accept, id))
}

pub async fn finish_import(
    pool: &SqlitePool,
    id: i64,
    record_count: u64,
    records_imported: u64,
    success: bool,
    errors: &[String],
) -> Result<()> {
    let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "UPDATE import_records
         SET record_count = ?1, records_imported = ?2, finished_at = ?3, success = ?4, errors = ?5
         WHERE id = ?6;",
    )
    .bind(record_count as i64)
    .bind(records_imported as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(success)
    .bind(errors_json)
    .bind(id)
    .execute(pool)
    .await
    .map_err(convert_error)?;
    Ok(())
}

pub async fn last_successful_import(pool: &SqlitePool) -> Result<Option<ImportRecord>> {
    let row: Option<ImportRow> = sqlx::query_as(
        "SELECT id, file_type, file_hash, sequence_number, record_count, records_imported,
                started_at, finished_at, success, errors
         FROM import_records WHERE success = 1 ORDER BY finished_at DESC LIMIT 1;",
    )
    .fetch_optional(pool)
    .await
    .map_err(convert_error)?;
    Ok(row.map(ImportRecord::from))
}
