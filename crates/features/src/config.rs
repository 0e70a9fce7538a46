//! Feature definition set.
//!
//! Everything in [`FeatureConfig`] participates in the schema fingerprint, so
//! changing any field is a schema bump.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gridcast_core::Horizon;

use crate::calendar;
use crate::error::{FeatureError, FeatureResult};

pub const INTRADAY_FORECAST: &str = "intraday_forecast";
pub const DAY_AHEAD_FORECAST: &str = "day_ahead_forecast";

/// What to do when a required slot has no record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImputationPolicy {
    /// Missing slots fail with a feature gap.
    #[default]
    #[serde(rename = "none")]
    Disabled,
    /// Carry the nearest earlier record forward, at most `max_steps` slots.
    ForwardFill { max_steps: u32 },
}

impl ImputationPolicy {
    pub fn max_fill_steps(&self) -> u32 {
        match self {
            ImputationPolicy::Disabled => 0,
            ImputationPolicy::ForwardFill { max_steps } => *max_steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Grid spacing of the record stream.
    pub resolution_minutes: u32,
    /// Lag steps, emitted as `lag_<k>`.
    pub lags: Vec<u32>,
    /// Per-horizon replacement for `lags`.
    pub horizon_lags: BTreeMap<Horizon, Vec<u32>>,
    /// Rolling windows in steps, emitted as `rolling_mean_<w>` / `rolling_std_<w>`.
    pub rolling_windows: Vec<u32>,
    pub calendar: bool,
    /// Names passed through from the latest causal record when present and
    /// within the forward-fill reach of `as_of`.
    pub exogenous: Vec<String>,
    pub imputation: ImputationPolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            resolution_minutes: 15,
            lags: vec![1, 4, 96],
            horizon_lags: BTreeMap::new(),
            rolling_windows: vec![4, 96],
            calendar: true,
            exogenous: vec![
                INTRADAY_FORECAST.to_string(),
                DAY_AHEAD_FORECAST.to_string(),
                "temperature".to_string(),
                "is_holiday".to_string(),
            ],
            imputation: ImputationPolicy::Disabled,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> FeatureResult<()> {
        if self.resolution_minutes == 0 || 1440 % self.resolution_minutes != 0 {
            return Err(FeatureError::validation(format!(
                "resolution_minutes must divide a day (got {})",
                self.resolution_minutes
            )));
        }

        if self.lags.iter().any(|&k| k == 0) {
            return Err(FeatureError::validation("lag steps must be >= 1"));
        }
        for (h, lags) in &self.horizon_lags {
            if lags.is_empty() || lags.iter().any(|&k| k == 0) {
                return Err(FeatureError::validation(format!(
                    "lag override for {h} must be non-empty with steps >= 1"
                )));
            }
        }

        if self.rolling_windows.iter().any(|&w| w < 2) {
            return Err(FeatureError::validation(
                "rolling windows must be >= 2 steps to compute a standard deviation",
            ));
        }

        if self.lags.is_empty() && self.rolling_windows.is_empty() && self.horizon_lags.is_empty() {
            return Err(FeatureError::validation(
                "at least one lag or rolling window is required",
            ));
        }

        let mut seen = BTreeSet::new();
        for name in &self.exogenous {
            if name.trim().is_empty() {
                return Err(FeatureError::validation("exogenous feature name cannot be empty"));
            }
            if name.starts_with("lag_")
                || name.starts_with("rolling_")
                || calendar::NAMES.contains(&name.as_str())
            {
                return Err(FeatureError::validation(format!(
                    "exogenous feature '{name}' collides with a generated feature name"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(FeatureError::validation(format!(
                    "exogenous feature '{name}' listed twice"
                )));
            }
        }

        if let ImputationPolicy::ForwardFill { max_steps: 0 } = self.imputation {
            return Err(FeatureError::validation("forward_fill max_steps must be >= 1"));
        }

        Ok(())
    }

    /// Sorted, de-duplicated copy. Two configs producing the same features
    /// normalize to the same value (and so the same fingerprint).
    pub fn normalized(&self) -> Self {
        fn canon(xs: &[u32]) -> Vec<u32> {
            xs.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
        }

        let mut exogenous = self.exogenous.clone();
        exogenous.sort();
        exogenous.dedup();

        Self {
            resolution_minutes: self.resolution_minutes,
            lags: canon(&self.lags),
            horizon_lags: self
                .horizon_lags
                .iter()
                .map(|(h, lags)| (*h, canon(lags)))
                .collect(),
            rolling_windows: canon(&self.rolling_windows),
            calendar: self.calendar,
            exogenous,
            imputation: self.imputation,
        }
    }

    pub fn lags_for(&self, horizon: Horizon) -> &[u32] {
        self.horizon_lags
            .get(&horizon)
            .map(Vec::as_slice)
            .unwrap_or(self.lags.as_slice())
    }

    /// Largest step referenced by the horizon's lags and rolling windows.
    pub fn max_lag(&self, horizon: Horizon) -> u32 {
        self.lags_for(horizon)
            .iter()
            .chain(self.rolling_windows.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Steps of history a caller must supply so every slot can be resolved,
    /// including the forward-fill reach.
    pub fn lookback_steps(&self, horizon: Horizon) -> u32 {
        self.max_lag(horizon) + self.imputation.max_fill_steps()
    }
}
