use serde::{Deserialize, Serialize};

use gridcast_core::ArtifactMetrics;

/// Offline acceptance thresholds checked before STAGED -> VALIDATED.
///
/// Unset limits are not checked.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub max_mae: Option<f64>,
    pub max_rmse: Option<f64>,
    pub max_mape: Option<f64>,
    pub max_peak_load_error: Option<f64>,
}

impl ValidationPolicy {
    /// `Err` lists every exceeded limit.
    pub fn check(&self, metrics: &ArtifactMetrics) -> Result<(), String> {
        let violations: Vec<String> = [
            ("mae", metrics.mae, self.max_mae),
            ("rmse", metrics.rmse, self.max_rmse),
            ("mape", metrics.mape, self.max_mape),
            ("peak_load_error", metrics.peak_load_error, self.max_peak_load_error),
        ]
        .into_iter()
        .filter_map(|(name, value, limit)| {
            limit
                .filter(|max| value > *max)
                .map(|max| format!("{name} {value} exceeds {max}"))
        })
        .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }
}
