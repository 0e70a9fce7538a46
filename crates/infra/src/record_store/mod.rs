//! Append-only record storage with a safe-to-read watermark.

mod in_memory;

pub use in_memory::InMemoryRecordStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use gridcast_core::TimeSeriesRecord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("a record at {0} already exists")]
    Duplicate(DateTime<Utc>),

    #[error("record at {timestamp} is older than the watermark {watermark}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        watermark: DateTime<Utc>,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, timestamp-keyed record log.
///
/// - `append` accepts only timestamps strictly after the watermark; records
///   are never reordered or replaced.
/// - The watermark is the latest timestamp such that it and everything before
///   it is stored. It only moves forward.
/// - Reads never return a record later than the watermark.
/// - Archived records are moved to cold storage, not deleted, and remain
///   readable through `range`.
pub trait RecordStore: Send + Sync {
    fn append(&self, record: TimeSeriesRecord) -> Result<(), StoreError>;

    /// Records with `start <= timestamp < end`, ascending.
    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TimeSeriesRecord>, StoreError>;

    fn get(&self, timestamp: DateTime<Utc>) -> Result<Option<TimeSeriesRecord>, StoreError>;

    fn watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Move records older than `cutoff` to the archive; returns how many moved.
    fn archive_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    fn append(&self, record: TimeSeriesRecord) -> Result<(), StoreError> {
        (**self).append(record)
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        (**self).range(start, end)
    }

    fn get(&self, timestamp: DateTime<Utc>) -> Result<Option<TimeSeriesRecord>, StoreError> {
        (**self).get(timestamp)
    }

    fn watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        (**self).watermark()
    }

    fn archive_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).archive_before(cutoff)
    }
}
