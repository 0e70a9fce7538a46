use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::horizon::Horizon;
use crate::id::{TriggerId, VersionId};
use crate::time::TimeRange;

/// Error statistic used for drift windows and baselines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMetric {
    #[default]
    Mae,
    Rmse,
}

impl ErrorMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorMetric::Mae => "mae",
            ErrorMetric::Rmse => "rmse",
        }
    }
}

/// One closed drift window. Append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftWindowStat {
    pub horizon: Horizon,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub observed_error: f64,
    pub model_version: VersionId,
    pub baseline_error: f64,
    pub metric: ErrorMetric,
    /// Whether `observed_error` exceeded `baseline_error * threshold_ratio`.
    pub breached: bool,
}

/// Fire-and-forget request to the training backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainTrigger {
    pub trigger_id: TriggerId,
    pub horizon: Horizon,
    pub reason: String,
    /// From the start of the first breaching window to the end of the last.
    pub window_range: TimeRange,
    pub model_version: VersionId,
    pub issued_at: DateTime<Utc>,
}

impl RetrainTrigger {
    pub const REASON_DRIFT: &'static str = "drift";

    pub fn drift(
        horizon: Horizon,
        window_range: TimeRange,
        model_version: VersionId,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trigger_id: TriggerId::new(),
            horizon,
            reason: Self::REASON_DRIFT.to_string(),
            window_range,
            model_version,
            issued_at,
        }
    }
}
