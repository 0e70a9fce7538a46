//! Append-only drift window history, per horizon.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use gridcast_core::{DriftWindowStat, Horizon};

use crate::record_store::StoreError;

pub trait DriftHistoryStore: Send + Sync {
    fn append(&self, stat: DriftWindowStat) -> Result<(), StoreError>;

    /// Closed windows for `horizon`, oldest first. `limit` keeps the newest `n`.
    fn list(&self, horizon: Horizon, limit: Option<usize>) -> Result<Vec<DriftWindowStat>, StoreError>;
}

impl<S> DriftHistoryStore for Arc<S>
where
    S: DriftHistoryStore + ?Sized,
{
    fn append(&self, stat: DriftWindowStat) -> Result<(), StoreError> {
        (**self).append(stat)
    }

    fn list(&self, horizon: Horizon, limit: Option<usize>) -> Result<Vec<DriftWindowStat>, StoreError> {
        (**self).list(horizon, limit)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDriftHistory {
    inner: RwLock<BTreeMap<Horizon, Vec<DriftWindowStat>>>,
}

impl InMemoryDriftHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DriftHistoryStore for InMemoryDriftHistory {
    fn append(&self, stat: DriftWindowStat) -> Result<(), StoreError> {
        let mut by_horizon = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        by_horizon.entry(stat.horizon).or_default().push(stat);
        Ok(())
    }

    fn list(&self, horizon: Horizon, limit: Option<usize>) -> Result<Vec<DriftWindowStat>, StoreError> {
        let by_horizon = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        let stats = by_horizon.get(&horizon).map(Vec::as_slice).unwrap_or_default();
        let skip = limit.map_or(0, |n| stats.len().saturating_sub(n));
        Ok(stats[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use gridcast_core::{ErrorMetric, VersionId};

    fn stat(horizon: Horizon, i: i64) -> DriftWindowStat {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap() + Duration::hours(i);
        DriftWindowStat {
            horizon,
            window_start: start,
            window_end: start + Duration::hours(1),
            observed_error: 10.0 + i as f64,
            model_version: VersionId::new(),
            baseline_error: 10.0,
            metric: ErrorMetric::Mae,
            breached: false,
        }
    }

    #[test]
    fn history_is_kept_per_horizon_in_append_order() {
        let h = InMemoryDriftHistory::new();
        for i in 0..5 {
            h.append(stat(Horizon::HOUR_1, i)).unwrap();
        }
        h.append(stat(Horizon::DAY_1, 0)).unwrap();

        let hour = h.list(Horizon::HOUR_1, None).unwrap();
        assert_eq!(hour.len(), 5);
        assert!(hour.windows(2).all(|w| w[0].window_start < w[1].window_start));

        let newest = h.list(Horizon::HOUR_1, Some(2)).unwrap();
        assert_eq!(newest, hour[3..].to_vec());
        assert!(h.list(Horizon::MINUTES_15, None).unwrap().is_empty());
    }
}
