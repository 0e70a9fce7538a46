//! Ingestion boundary: appends clean records and reports per-record outcomes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use gridcast_core::TimeSeriesRecord;

use crate::outcome::OutcomeJoiner;
use crate::record_store::{RecordStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("duplicate record at {0}")]
    Duplicate(DateTime<Utc>),

    #[error("record at {timestamp} arrived after the watermark {watermark}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        watermark: DateTime<Utc>,
    },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("record store error: {0}")]
    Store(StoreError),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Duplicate(_) => "duplicate",
            IngestError::OutOfOrder { .. } => "out_of_order",
            IngestError::Malformed(_) => "malformed",
            IngestError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(ts) => IngestError::Duplicate(ts),
            StoreError::OutOfOrder { timestamp, watermark } => IngestError::OutOfOrder { timestamp, watermark },
            other => IngestError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position in the submitted batch.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub accepted: Vec<DateTime<Utc>>,
    pub rejected: Vec<RejectedRecord>,
    pub watermark: Option<DateTime<Utc>>,
}

pub struct IngestionService {
    store: Arc<dyn RecordStore>,
    joiner: Arc<OutcomeJoiner>,
    retention: Option<Duration>,
}

impl core::fmt::Debug for IngestionService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IngestionService")
            .field("retention", &self.retention)
            .finish()
    }
}

impl IngestionService {
    pub fn new(store: Arc<dyn RecordStore>, joiner: Arc<OutcomeJoiner>) -> Self {
        Self {
            store,
            joiner,
            retention: None,
        }
    }

    /// Archive records older than `retention` behind the watermark after each batch.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn ingest(&self, record: TimeSeriesRecord) -> Result<(), IngestError> {
        record.validate().map_err(|e| IngestError::Malformed(e.to_string()))?;
        self.store.append(record.clone())?;
        if let Err(e) = self.joiner.record_ingested(&record) {
            warn!(timestamp = %record.timestamp, error = ?e, "outcome join skipped");
        }
        Ok(())
    }

    /// A bad record rejects only itself; the rest of the batch still lands.
    pub fn ingest_batch(&self, records: Vec<TimeSeriesRecord>) -> IngestReport {
        let mut report = IngestReport::default();

        for (index, record) in records.into_iter().enumerate() {
            let timestamp = record.timestamp;
            match self.ingest(record) {
                Ok(()) => report.accepted.push(timestamp),
                Err(e) => {
                    debug!(index, timestamp = %timestamp, error = %e, "record rejected");
                    report.rejected.push(RejectedRecord {
                        index,
                        timestamp,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report.watermark = self.store.watermark().ok().flatten();
        if let (Some(retention), Some(watermark)) = (self.retention, report.watermark) {
            let cutoff = watermark - retention;
            match self.store.archive_before(cutoff) {
                Ok(0) => {}
                Ok(moved) => info!(moved, cutoff = %cutoff, "records archived"),
                Err(e) => warn!(error = ?e, "archiving failed"),
            }
        }

        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "ingested record batch"
        );
        report
    }
}
