//! Joins issued forecasts with the actual load observed at their target.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use gridcast_core::{ForecastResult, ObservedPair, TimeSeriesRecord};
use gridcast_events::{GridEvent, GridStream};

use crate::record_store::{RecordStore, StoreError};

/// Pairs forecasts with actuals and publishes `OutcomeObserved`.
///
/// Both entry points take the same lock. A forecast checks the store under the
/// lock; ingestion appends to the store *before* taking it. Whichever side
/// comes second sees the other, so every forecast whose target is ingested is
/// paired exactly once.
pub struct OutcomeJoiner {
    store: Arc<dyn RecordStore>,
    stream: Arc<dyn GridStream>,
    pending: Mutex<BTreeMap<DateTime<Utc>, Vec<ForecastResult>>>,
}

impl core::fmt::Debug for OutcomeJoiner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutcomeJoiner")
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl OutcomeJoiner {
    pub fn new(store: Arc<dyn RecordStore>, stream: Arc<dyn GridStream>) -> Self {
        Self {
            store,
            stream,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Forecasts still waiting for their actual.
    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .map(|p| p.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn forecast_issued(&self, result: &ForecastResult) -> Result<(), StoreError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| StoreError::Unavailable("outcome joiner lock poisoned".to_string()))?;

        match self.store.get(result.target_timestamp)? {
            Some(record) => self.emit(ObservedPair::from_forecast(result, record.actual_load)),
            None => {
                // A target at or before the watermark with no record can never be filled.
                let unreachable = self
                    .store
                    .watermark()?
                    .is_some_and(|w| result.target_timestamp <= w);
                if !unreachable {
                    pending
                        .entry(result.target_timestamp)
                        .or_default()
                        .push(result.clone());
                }
            }
        }
        Ok(())
    }

    /// Call after `record` is durably appended.
    pub fn record_ingested(&self, record: &TimeSeriesRecord) -> Result<(), StoreError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| StoreError::Unavailable("outcome joiner lock poisoned".to_string()))?;

        let later = pending.split_off(&(record.timestamp + chrono::Duration::nanoseconds(1)));
        let due = std::mem::replace(&mut *pending, later);
        drop(pending);

        for (target, forecasts) in due {
            if target == record.timestamp {
                for forecast in &forecasts {
                    self.emit(ObservedPair::from_forecast(forecast, record.actual_load));
                }
            } else {
                debug!(target = %target, dropped = forecasts.len(), "no actual was ingested for forecast target");
            }
        }
        Ok(())
    }

    fn emit(&self, pair: ObservedPair) {
        let horizon = pair.horizon;
        let version = pair.model_version;
        if let Err(e) = self.stream.publish(GridEvent::OutcomeObserved(pair)) {
            warn!(horizon = %horizon, version = %version, error = ?e, "observed pair not published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use gridcast_core::{Horizon, SchemaVersion, VersionId};
    use gridcast_events::{EventEnvelope, InMemoryEventBus, SequencedPublisher};

    use crate::record_store::InMemoryRecordStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<GridEvent>>>;

    fn at(step: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap() + Duration::minutes(15 * step)
    }

    fn forecast(target_step: i64, predicted: f64) -> ForecastResult {
        ForecastResult {
            horizon: Horizon::HOUR_1,
            predicted_load: predicted,
            model_version: VersionId::new(),
            generated_at: at(target_step - 4),
            as_of_timestamp: at(target_step - 4),
            target_timestamp: at(target_step),
            schema_version: SchemaVersion::new("fs-test"),
        }
    }

    fn setup() -> (Arc<InMemoryRecordStore>, OutcomeJoiner, gridcast_events::Subscription<EventEnvelope<GridEvent>>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let publisher = Arc::new(SequencedPublisher::new(Bus::default()));
        let sub = publisher.subscribe();
        let joiner = OutcomeJoiner::new(store.clone(), publisher);
        (store, joiner, sub)
    }

    fn observed(sub: &gridcast_events::Subscription<EventEnvelope<GridEvent>>) -> Vec<ObservedPair> {
        std::iter::from_fn(|| sub.try_recv().ok())
            .filter_map(|env| match env.into_payload() {
                GridEvent::OutcomeObserved(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn pairs_when_actual_arrives_later() {
        let (store, joiner, sub) = setup();
        store.append(TimeSeriesRecord::new(at(0), 100.0)).unwrap();
        joiner.forecast_issued(&forecast(4, 110.0)).unwrap();
        assert_eq!(joiner.pending_len(), 1);

        for step in 1..=4 {
            let r = TimeSeriesRecord::new(at(step), 120.0);
            store.append(r.clone()).unwrap();
            joiner.record_ingested(&r).unwrap();
        }

        let pairs = observed(&sub);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].predicted, 110.0);
        assert_eq!(pairs[0].actual, 120.0);
        assert_eq!(pairs[0].target_timestamp, at(4));
        assert_eq!(joiner.pending_len(), 0);
    }

    #[test]
    fn pairs_immediately_when_actual_is_known() {
        let (store, joiner, sub) = setup();
        store.append(TimeSeriesRecord::new(at(4), 95.0)).unwrap();
        joiner.forecast_issued(&forecast(4, 90.0)).unwrap();
        assert_eq!(observed(&sub).len(), 1);
        assert_eq!(joiner.pending_len(), 0);
    }

    #[test]
    fn skipped_targets_are_dropped() {
        let (store, joiner, sub) = setup();
        joiner.forecast_issued(&forecast(4, 90.0)).unwrap();

        let r = TimeSeriesRecord::new(at(5), 100.0);
        store.append(r.clone()).unwrap();
        joiner.record_ingested(&r).unwrap();

        assert!(observed(&sub).is_empty());
        assert_eq!(joiner.pending_len(), 0);
    }
}
