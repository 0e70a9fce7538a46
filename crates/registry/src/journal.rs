//! Registry journal: the append-only log the catalog is rebuilt from.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use gridcast_core::ExpectedVersion;
use gridcast_events::Event;

use crate::catalog::CatalogEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("journal entry could not be encoded or decoded: {0}")]
    Serialization(String),

    #[error("journal storage failure: {0}")]
    Storage(String),
}

/// A catalog event ready to be appended (no sequence number yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncommittedEntry {
    pub event_id: Uuid,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl UncommittedEntry {
    pub fn from_event(event: &CatalogEvent) -> Result<Self, JournalError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| JournalError::Serialization(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    pub fn commit(self, sequence_number: u64) -> JournalEntry {
        JournalEntry {
            event_id: self.event_id,
            sequence_number,
            event_type: self.event_type,
            event_version: self.event_version,
            occurred_at: self.occurred_at,
            payload: self.payload,
        }
    }
}

/// A committed journal entry. Sequence numbers start at 1 and have no gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub event_id: Uuid,
    pub sequence_number: u64,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl JournalEntry {
    pub fn decode(&self) -> Result<CatalogEvent, JournalError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            JournalError::Serialization(format!(
                "entry {} ({}) is not a catalog event: {e}",
                self.sequence_number, self.event_type
            ))
        })
    }
}

/// Append-only registry journal.
///
/// Implementations must check `expected` against the current length, assign
/// `current + 1, current + 2, ...` and persist the batch atomically.
pub trait RegistryJournal: Send + Sync {
    fn append(
        &self,
        entries: Vec<UncommittedEntry>,
        expected: ExpectedVersion,
    ) -> Result<Vec<JournalEntry>, JournalError>;

    /// Every entry, in sequence order.
    fn load(&self) -> Result<Vec<JournalEntry>, JournalError>;
}

impl<J> RegistryJournal for Arc<J>
where
    J: RegistryJournal + ?Sized,
{
    fn append(
        &self,
        entries: Vec<UncommittedEntry>,
        expected: ExpectedVersion,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        (**self).append(entries, expected)
    }

    fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        (**self).load()
    }
}

/// In-memory journal for tests/dev. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryRegistryJournal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl InMemoryRegistryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryJournal for InMemoryRegistryJournal {
    fn append(
        &self,
        entries: Vec<UncommittedEntry>,
        expected: ExpectedVersion,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        let mut log = self
            .entries
            .write()
            .map_err(|_| JournalError::Storage("lock poisoned".to_string()))?;

        let current = log.len() as u64;
        if !expected.matches(current) {
            return Err(JournalError::Concurrency(format!(
                "expected {expected:?}, journal is at {current}"
            )));
        }

        let committed: Vec<JournalEntry> = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.commit(current + i as u64 + 1))
            .collect();
        log.extend(committed.iter().cloned());
        Ok(committed)
    }

    fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let log = self
            .entries
            .read()
            .map_err(|_| JournalError::Storage("lock poisoned".to_string()))?;
        Ok(log.clone())
    }
}
