use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use gridcast_core::{Horizon, SchemaVersion, TimeSeriesRecord};

use crate::calendar;
use crate::config::{DAY_AHEAD_FORECAST, FeatureConfig, INTRADAY_FORECAST};
use crate::error::FeatureResult;
use crate::schema::schema_version_of;
use crate::stats::{mean, stddev_sample};
use crate::vector::FeatureVector;
use crate::window::CausalWindow;

/// A validated feature definition set and its schema version.
///
/// `compute` is a pure function of `(records, as_of, horizon)`:
///
/// - only records strictly before `as_of` are read; later ones are ignored,
///   so appending to the window never changes the output;
/// - `lag_k` is the load `k` resolution steps before `as_of`;
/// - rolling statistics cover steps `1..=w`;
/// - a missing slot is a [`FeatureError::Gap`](crate::FeatureError::Gap)
///   unless forward fill is configured and reaches it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePipeline {
    config: FeatureConfig,
    schema_version: SchemaVersion,
}

impl FeaturePipeline {
    pub fn new(config: FeatureConfig) -> FeatureResult<Self> {
        config.validate()?;
        let config = config.normalized();
        let schema_version = schema_version_of(&config)?;
        Ok(Self {
            config,
            schema_version,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    pub fn resolution(&self) -> Duration {
        Duration::minutes(i64::from(self.config.resolution_minutes))
    }

    /// Earliest timestamp `compute` may need for `(as_of, horizon)`.
    pub fn window_start(&self, as_of: DateTime<Utc>, horizon: Horizon) -> DateTime<Utc> {
        let steps = i32::try_from(self.config.lookback_steps(horizon)).unwrap_or(i32::MAX);
        as_of - self.resolution() * steps
    }

    pub fn compute(
        &self,
        records: &[TimeSeriesRecord],
        as_of: DateTime<Utc>,
        horizon: Horizon,
    ) -> FeatureResult<FeatureVector> {
        let window = CausalWindow::index(records, as_of, self.resolution())?;
        let policy = self.config.imputation;
        let mut values = BTreeMap::new();

        for &k in self.config.lags_for(horizon) {
            values.insert(format!("lag_{k}"), window.load_at(k, policy)?);
        }

        for &w in &self.config.rolling_windows {
            let xs = (1..=w)
                .map(|k| window.load_at(k, policy))
                .collect::<FeatureResult<Vec<_>>>()?;
            let m = mean(&xs);
            values.insert(format!("rolling_mean_{w}"), m);
            values.insert(format!("rolling_std_{w}"), stddev_sample(&xs, m));
        }

        if self.config.calendar {
            for (name, value) in calendar::encode(as_of) {
                values.insert(name.to_string(), value);
            }
        }

        // Exogenous inputs get the same reach as lag_1; older ones are omitted.
        if let Some(latest) = window.latest_within(1 + policy.max_fill_steps()) {
            for name in &self.config.exogenous {
                if let Some(value) = passthrough(latest, name) {
                    values.insert(name.clone(), value);
                }
            }
        }

        Ok(FeatureVector {
            as_of_timestamp: as_of,
            horizon,
            schema_version: self.schema_version.clone(),
            values,
        })
    }
}

fn passthrough(record: &TimeSeriesRecord, name: &str) -> Option<f64> {
    match name {
        INTRADAY_FORECAST => record.intraday_forecast,
        DAY_AHEAD_FORECAST => record.day_ahead_forecast,
        other => record.exogenous.get(other).copied(),
    }
}
