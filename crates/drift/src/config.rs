use chrono::Duration;
use serde::{Deserialize, Serialize};

use gridcast_core::ErrorMetric;

use crate::error::DriftError;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Pairs per tumbling window (W).
    pub window_size: usize,
    /// Consecutive breaching windows before a trigger (K).
    pub consecutive_breaches: u32,
    /// A window breaches when `observed_error >= baseline * threshold_ratio`.
    pub threshold_ratio: f64,
    pub metric: ErrorMetric,
    /// How long RETRAIN_PENDING lasts without a new promotion.
    pub cooldown_minutes: u32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            window_size: 96,
            consecutive_breaches: 3,
            threshold_ratio: 1.5,
            metric: ErrorMetric::Mae,
            cooldown_minutes: 24 * 60,
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<(), DriftError> {
        if self.window_size == 0 {
            return Err(DriftError::InvalidConfig("window_size must be >= 1".to_string()));
        }
        if self.consecutive_breaches == 0 {
            return Err(DriftError::InvalidConfig(
                "consecutive_breaches must be >= 1".to_string(),
            ));
        }
        if !(self.threshold_ratio.is_finite() && self.threshold_ratio > 0.0) {
            return Err(DriftError::InvalidConfig(
                "threshold_ratio must be a finite positive number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }
}
