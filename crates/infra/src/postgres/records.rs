use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;

use gridcast_core::TimeSeriesRecord;

use super::{PgBackend, describe, is_unique_violation};
use crate::record_store::{RecordStore, StoreError};

/// Record store over `load_records`.
///
/// Appends take a table lock, so the max timestamp (the watermark) and the
/// insert are checked and written in one transaction.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    backend: PgBackend,
}

impl PostgresRecordStore {
    pub fn new(backend: PgBackend) -> Self {
        Self { backend }
    }

    #[instrument(skip(self, record), fields(ts = %record.timestamp), err)]
    async fn append_record(&self, record: TimeSeriesRecord) -> Result<(), StoreError> {
        let unavailable = |e: sqlx::Error| StoreError::Unavailable(describe("append", &e));
        let mut tx = self.backend.pool().begin().await.map_err(unavailable)?;

        sqlx::query("LOCK TABLE load_records IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        let watermark: Option<DateTime<Utc>> = sqlx::query_scalar("SELECT MAX(ts) FROM load_records")
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable)?;

        if let Some(watermark) = watermark {
            if record.timestamp == watermark {
                return Err(StoreError::Duplicate(record.timestamp));
            }
            if record.timestamp < watermark {
                let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM load_records WHERE ts = $1)")
                    .bind(record.timestamp)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(unavailable)?;
                return Err(if exists {
                    StoreError::Duplicate(record.timestamp)
                } else {
                    StoreError::OutOfOrder {
                        timestamp: record.timestamp,
                        watermark,
                    }
                });
            }
        }

        let exogenous = serde_json::to_value(&record.exogenous)
            .map_err(|e| StoreError::Unavailable(format!("exogenous encoding failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO load_records (ts, actual_load, intraday_forecast, day_ahead_forecast, exogenous)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.timestamp)
        .bind(record.actual_load)
        .bind(record.intraday_forecast)
        .bind(record.day_ahead_forecast)
        .bind(exogenous)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(record.timestamp)
            } else {
                unavailable(e)
            }
        })?;

        tx.commit().await.map_err(unavailable)
    }

    async fn fetch_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT ts, actual_load, intraday_forecast, day_ahead_forecast, exogenous
            FROM load_records
            WHERE ts >= $1 AND ts < $2
            ORDER BY ts ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.backend.pool())
        .await
        .map_err(|e| StoreError::Unavailable(describe("range", &e)))?;

        rows.iter().map(decode).collect()
    }

    async fn fetch_one(&self, ts: DateTime<Utc>) -> Result<Option<TimeSeriesRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT ts, actual_load, intraday_forecast, day_ahead_forecast, exogenous FROM load_records WHERE ts = $1",
        )
        .bind(ts)
        .fetch_optional(self.backend.pool())
        .await
        .map_err(|e| StoreError::Unavailable(describe("get", &e)))?;

        row.as_ref().map(decode).transpose()
    }
}

fn decode(row: &PgRow) -> Result<TimeSeriesRecord, StoreError> {
    let bad = |e: sqlx::Error| StoreError::Unavailable(describe("decode record", &e));
    let exogenous: JsonValue = row.try_get("exogenous").map_err(bad)?;
    let exogenous: BTreeMap<String, f64> = serde_json::from_value(exogenous)
        .map_err(|e| StoreError::Unavailable(format!("stored exogenous map is invalid: {e}")))?;

    Ok(TimeSeriesRecord {
        timestamp: row.try_get("ts").map_err(bad)?,
        actual_load: row.try_get("actual_load").map_err(bad)?,
        intraday_forecast: row.try_get("intraday_forecast").map_err(bad)?,
        day_ahead_forecast: row.try_get("day_ahead_forecast").map_err(bad)?,
        exogenous,
    })
}

impl RecordStore for PostgresRecordStore {
    fn append(&self, record: TimeSeriesRecord) -> Result<(), StoreError> {
        self.backend.block_on(self.append_record(record))
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        self.backend.block_on(self.fetch_range(start, end))
    }

    fn get(&self, timestamp: DateTime<Utc>) -> Result<Option<TimeSeriesRecord>, StoreError> {
        self.backend.block_on(self.fetch_one(timestamp))
    }

    fn watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.backend.block_on(async {
            sqlx::query_scalar("SELECT MAX(ts) FROM load_records")
                .fetch_one(self.backend.pool())
                .await
                .map_err(|e| StoreError::Unavailable(describe("watermark", &e)))
        })
    }

    fn archive_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.backend.block_on(async {
            let done = sqlx::query("UPDATE load_records SET archived = TRUE WHERE ts < $1 AND NOT archived")
                .bind(cutoff)
                .execute(self.backend.pool())
                .await
                .map_err(|e| StoreError::Unavailable(describe("archive", &e)))?;
            Ok(usize::try_from(done.rows_affected()).unwrap_or(usize::MAX))
        })
    }
}
