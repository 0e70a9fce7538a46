use std::sync::RwLock;

use chrono::{DateTime, Utc};

use gridcast_core::TimeSeriesRecord;

use super::{RecordStore, StoreError};

#[derive(Debug, Default)]
struct Tiers {
    /// Older records moved out of the hot set; still ascending.
    archive: Vec<TimeSeriesRecord>,
    live: Vec<TimeSeriesRecord>,
    watermark: Option<DateTime<Utc>>,
}

impl Tiers {
    fn slice(records: &[TimeSeriesRecord], start: DateTime<Utc>, end: DateTime<Utc>) -> &[TimeSeriesRecord] {
        let lo = records.partition_point(|r| r.timestamp < start);
        let hi = records.partition_point(|r| r.timestamp < end);
        &records[lo..hi.max(lo)]
    }

    fn find(records: &[TimeSeriesRecord], timestamp: DateTime<Utc>) -> Option<&TimeSeriesRecord> {
        records
            .binary_search_by_key(&timestamp, |r| r.timestamp)
            .ok()
            .map(|i| &records[i])
    }
}

/// In-memory record store for tests/dev and single-node deployments.
///
/// Writes take the lock once and publish the new watermark in the same
/// critical section, so a reader never sees a record ahead of it.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<Tiers>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archived_len(&self) -> usize {
        self.inner.read().map(|t| t.archive.len()).unwrap_or(0)
    }

    pub fn live_len(&self) -> usize {
        self.inner.read().map(|t| t.live.len()).unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl RecordStore for InMemoryRecordStore {
    fn append(&self, record: TimeSeriesRecord) -> Result<(), StoreError> {
        let mut tiers = self.inner.write().map_err(|_| poisoned())?;

        if let Some(watermark) = tiers.watermark {
            if record.timestamp == watermark
                || Tiers::find(&tiers.live, record.timestamp).is_some()
                || Tiers::find(&tiers.archive, record.timestamp).is_some()
            {
                return Err(StoreError::Duplicate(record.timestamp));
            }
            if record.timestamp < watermark {
                return Err(StoreError::OutOfOrder {
                    timestamp: record.timestamp,
                    watermark,
                });
            }
        }

        let timestamp = record.timestamp;
        tiers.live.push(record);
        tiers.watermark = Some(timestamp);
        Ok(())
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        let tiers = self.inner.read().map_err(|_| poisoned())?;
        let Some(watermark) = tiers.watermark else {
            return Ok(Vec::new());
        };
        let end = end.min(watermark + chrono::Duration::nanoseconds(1));

        let mut out = Tiers::slice(&tiers.archive, start, end).to_vec();
        out.extend_from_slice(Tiers::slice(&tiers.live, start, end));
        Ok(out)
    }

    fn get(&self, timestamp: DateTime<Utc>) -> Result<Option<TimeSeriesRecord>, StoreError> {
        let tiers = self.inner.read().map_err(|_| poisoned())?;
        Ok(Tiers::find(&tiers.live, timestamp)
            .or_else(|| Tiers::find(&tiers.archive, timestamp))
            .cloned())
    }

    fn watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.inner.read().map_err(|_| poisoned())?.watermark)
    }

    fn archive_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tiers = self.inner.write().map_err(|_| poisoned())?;
        let n = tiers.live.partition_point(|r| r.timestamp < cutoff);
        let moved: Vec<_> = tiers.live.drain(..n).collect();
        tiers.archive.extend(moved);
        Ok(n)
    }
}
