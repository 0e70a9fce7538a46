use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use gridcast_core::{
    ArtifactMetrics, DriftWindowStat, Horizon, ModelArtifact, SchemaVersion, TimeRange, TimeSeriesRecord, VersionId,
};
use gridcast_infra::workers::DriftStatus;

#[derive(Debug, Deserialize)]
pub struct IngestRecordsRequest {
    pub records: Vec<TimeSeriesRecord>,
}

/// A trainer's output, submitted for registration as STAGED.
#[derive(Debug, Deserialize)]
pub struct RegisterModelRequest {
    /// Generated when omitted.
    #[serde(default)]
    pub version_id: Option<VersionId>,
    pub horizon: Horizon,
    pub schema_version: SchemaVersion,
    pub trained_window: TimeRange,
    pub metrics: ArtifactMetrics,
    #[serde(default)]
    pub runtime: JsonValue,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RegisterModelRequest {
    pub fn into_artifact(self, now: DateTime<Utc>) -> ModelArtifact {
        ModelArtifact::staged(
            self.version_id.unwrap_or_default(),
            self.horizon,
            self.schema_version,
            self.trained_window,
            self.metrics,
            self.created_at.unwrap_or(now),
        )
        .with_runtime(self.runtime)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DriftHistoryQuery {
    /// Newest `limit` windows; all when omitted.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DriftHistoryResponse {
    pub horizon: Horizon,
    pub status: Option<DriftStatus>,
    pub windows: Vec<DriftWindowStat>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub schema_version: SchemaVersion,
    pub registry_version: u64,
}

/// Claim size when the trainer does not ask for one.
pub const DEFAULT_CLAIM_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ClaimTriggersQuery {
    pub limit: Option<usize>,
}
