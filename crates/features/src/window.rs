use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use gridcast_core::TimeSeriesRecord;

use crate::config::ImputationPolicy;
use crate::error::{FeatureError, FeatureResult};

/// Records strictly before `as_of`, addressed by step distance from `as_of`.
pub(crate) struct CausalWindow<'a> {
    as_of: DateTime<Utc>,
    resolution: Duration,
    slots: BTreeMap<u32, &'a TimeSeriesRecord>,
    latest: Option<&'a TimeSeriesRecord>,
}

impl<'a> CausalWindow<'a> {
    pub(crate) fn index(
        records: &'a [TimeSeriesRecord],
        as_of: DateTime<Utc>,
        resolution: Duration,
    ) -> FeatureResult<Self> {
        if let Some(pair) = records
            .windows(2)
            .find(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(FeatureError::validation(format!(
                "record window is not strictly increasing at {}",
                pair[1].timestamp
            )));
        }

        let step_secs = resolution.num_seconds();
        let mut slots = BTreeMap::new();
        let mut latest = None;

        for record in records.iter().take_while(|r| r.timestamp < as_of) {
            record
                .validate()
                .map_err(|e| FeatureError::validation(e.to_string()))?;
            latest = Some(record);

            let distance = (as_of - record.timestamp).num_seconds();
            if distance % step_secs != 0 {
                continue;
            }
            if let Ok(step) = u32::try_from(distance / step_secs) {
                slots.insert(step, record);
            }
        }

        Ok(Self {
            as_of,
            resolution,
            slots,
            latest,
        })
    }

    /// Most recent record strictly before `as_of`, on the grid or not, if it
    /// lies no more than `steps` slots back.
    pub(crate) fn latest_within(&self, steps: u32) -> Option<&'a TimeSeriesRecord> {
        let reach = self.resolution * i32::try_from(steps).unwrap_or(i32::MAX);
        self.latest.filter(|r| r.timestamp >= self.as_of - reach)
    }

    /// Load `step` slots before `as_of`, honoring the imputation policy.
    pub(crate) fn load_at(&self, step: u32, policy: ImputationPolicy) -> FeatureResult<f64> {
        let reach = policy.max_fill_steps();
        (step..=step.saturating_add(reach))
            .find_map(|k| self.slots.get(&k))
            .map(|r| r.actual_load)
            .ok_or_else(|| FeatureError::Gap {
                as_of: self.as_of,
                missing_at: self.as_of - self.resolution * i32::try_from(step).unwrap_or(i32::MAX),
                step,
            })
    }
}
