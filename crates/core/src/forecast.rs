use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::SchemaVersion;
use crate::horizon::Horizon;
use crate::id::VersionId;

/// A request for one horizon. Batched horizons are repeated requests.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub as_of_timestamp: DateTime<Utc>,
    pub horizon: Horizon,
}

impl ForecastRequest {
    pub fn new(as_of_timestamp: DateTime<Utc>, horizon: Horizon) -> Self {
        Self {
            as_of_timestamp,
            horizon,
        }
    }

    /// The instant whose load is being forecast.
    pub fn target_timestamp(&self) -> DateTime<Utc> {
        self.as_of_timestamp + self.horizon.duration()
    }
}

/// A served forecast, stamped with the artifact that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub horizon: Horizon,
    pub predicted_load: f64,
    pub model_version: VersionId,
    pub generated_at: DateTime<Utc>,
    pub as_of_timestamp: DateTime<Utc>,
    pub target_timestamp: DateTime<Utc>,
    pub schema_version: SchemaVersion,
}

/// A forecast joined with the actual load eventually observed at its target.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedPair {
    pub horizon: Horizon,
    pub model_version: VersionId,
    pub target_timestamp: DateTime<Utc>,
    pub predicted: f64,
    pub actual: f64,
}

impl ObservedPair {
    pub fn from_forecast(result: &ForecastResult, actual: f64) -> Self {
        Self {
            horizon: result.horizon,
            model_version: result.model_version,
            target_timestamp: result.target_timestamp,
            predicted: result.predicted_load,
            actual,
        }
    }

    /// Signed residual (`actual - predicted`).
    pub fn residual(&self) -> f64 {
        self.actual - self.predicted
    }
}
