use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use gridcast_core::ExpectedVersion;
use gridcast_registry::{JournalEntry, JournalError, RegistryJournal, UncommittedEntry};

use super::{PgBackend, describe, is_unique_violation};

/// Registry journal over `registry_journal`.
///
/// `append` checks the expected version and inserts the batch in one
/// transaction; a concurrent writer that slips past the check collides on the
/// sequence-number primary key and surfaces as `Concurrency`.
#[derive(Debug, Clone)]
pub struct PostgresRegistryJournal {
    backend: PgBackend,
}

impl PostgresRegistryJournal {
    pub fn new(backend: PgBackend) -> Self {
        Self { backend }
    }

    #[instrument(skip(self, entries), fields(entry_count = entries.len(), expected = ?expected), err)]
    async fn append_entries(
        &self,
        entries: Vec<UncommittedEntry>,
        expected: ExpectedVersion,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let storage = |e: sqlx::Error| JournalError::Storage(describe("journal append", &e));
        let mut tx = self.backend.pool().begin().await.map_err(storage)?;

        let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(sequence_number), 0) FROM registry_journal")
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;
        let current = u64::try_from(current).unwrap_or(0);

        if !expected.matches(current) {
            return Err(JournalError::Concurrency(format!(
                "expected {expected:?}, journal is at {current}"
            )));
        }

        let mut committed = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let entry = entry.commit(current + i as u64 + 1);
            sqlx::query(
                r#"
                INSERT INTO registry_journal
                    (sequence_number, event_id, event_type, event_version, occurred_at, payload)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(i64::try_from(entry.sequence_number).unwrap_or(i64::MAX))
            .bind(entry.event_id)
            .bind(&entry.event_type)
            .bind(i32::try_from(entry.event_version).unwrap_or(i32::MAX))
            .bind(entry.occurred_at)
            .bind(&entry.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    JournalError::Concurrency(describe("journal append", &e))
                } else {
                    storage(e)
                }
            })?;
            committed.push(entry);
        }

        tx.commit().await.map_err(storage)?;
        Ok(committed)
    }

    async fn load_entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let storage = |e: sqlx::Error| JournalError::Storage(describe("journal load", &e));
        let rows = sqlx::query(
            r#"
            SELECT sequence_number, event_id, event_type, event_version, occurred_at, payload
            FROM registry_journal
            ORDER BY sequence_number ASC
            "#,
        )
        .fetch_all(self.backend.pool())
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let sequence_number: i64 = row.try_get("sequence_number").map_err(storage)?;
                let event_version: i32 = row.try_get("event_version").map_err(storage)?;
                let event_id: Uuid = row.try_get("event_id").map_err(storage)?;
                let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(storage)?;
                let payload: JsonValue = row.try_get("payload").map_err(storage)?;
                Ok(JournalEntry {
                    event_id,
                    sequence_number: u64::try_from(sequence_number).unwrap_or(0),
                    event_type: row.try_get("event_type").map_err(storage)?,
                    event_version: u32::try_from(event_version).unwrap_or(0),
                    occurred_at,
                    payload,
                })
            })
            .collect()
    }
}

impl RegistryJournal for PostgresRegistryJournal {
    fn append(
        &self,
        entries: Vec<UncommittedEntry>,
        expected: ExpectedVersion,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        self.backend.block_on(self.append_entries(entries, expected))
    }

    fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        self.backend.block_on(self.load_entries())
    }
}
