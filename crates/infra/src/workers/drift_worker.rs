//! Per-horizon drift worker: the single writer for one [`DriftMonitor`].

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use gridcast_core::{DriftWindowStat, Horizon, ModelArtifact, VersionId};
use gridcast_drift::{DriftConfig, DriftError, DriftMonitor, DriftState};
use gridcast_events::{EventEnvelope, GridEvent, Subscription};

use crate::drift_history::DriftHistoryStore;
use crate::record_store::StoreError;
use crate::training::RetrainSink;

use super::stream_worker::{StreamHandler, StreamWorker, WorkerHandle};

#[derive(Debug, Error)]
pub enum DriftWorkerError {
    #[error(transparent)]
    Drift(#[from] DriftError),

    #[error("drift history write failed: {0}")]
    History(#[from] StoreError),
}

/// Point-in-time view of one horizon's monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftStatus {
    pub horizon: Horizon,
    pub state: DriftState,
    pub tracked_version: Option<VersionId>,
    pub consecutive_breaches: u32,
    pub pending_pairs: usize,
    pub last_window: Option<DriftWindowStat>,
}

/// Latest [`DriftStatus`] per horizon, written by the drift workers.
#[derive(Debug, Default)]
pub struct DriftStatusBoard {
    inner: RwLock<BTreeMap<Horizon, DriftStatus>>,
}

impl DriftStatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, horizon: Horizon) -> Option<DriftStatus> {
        self.inner.read().ok()?.get(&horizon).cloned()
    }

    pub fn all(&self) -> Vec<DriftStatus> {
        self.inner
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    fn publish(&self, status: DriftStatus) {
        if let Ok(mut m) = self.inner.write() {
            m.insert(status.horizon, status);
        }
    }
}

pub struct DriftWorker {
    monitor: DriftMonitor,
    history: Arc<dyn DriftHistoryStore>,
    retrain: Arc<dyn RetrainSink>,
    board: Arc<DriftStatusBoard>,
    last_window: Option<DriftWindowStat>,
}

impl core::fmt::Debug for DriftWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DriftWorker")
            .field("horizon", &self.monitor.horizon())
            .field("state", &self.monitor.state())
            .finish()
    }
}

impl DriftWorker {
    pub fn new(
        horizon: Horizon,
        config: DriftConfig,
        history: Arc<dyn DriftHistoryStore>,
        retrain: Arc<dyn RetrainSink>,
        board: Arc<DriftStatusBoard>,
    ) -> Result<Self, DriftError> {
        let worker = Self {
            monitor: DriftMonitor::new(horizon, config)?,
            history,
            retrain,
            board,
            last_window: None,
        };
        worker.report();
        Ok(worker)
    }

    pub fn horizon(&self) -> Horizon {
        self.monitor.horizon()
    }

    /// Seed tracking from the artifact that was ACTIVE at startup.
    pub fn track(&mut self, artifact: &ModelArtifact) -> Result<(), DriftError> {
        let baseline = artifact.metrics().baseline(self.monitor.config().metric);
        self.monitor.track_model(artifact.version_id(), baseline)?;
        self.report();
        Ok(())
    }

    /// Run on a dedicated thread named `drift-<horizon>`.
    pub fn spawn(self, subscription: Subscription<EventEnvelope<GridEvent>>) -> io::Result<WorkerHandle> {
        let horizon = self.horizon();
        StreamWorker::spawn(format!("drift-{horizon}"), subscription, Some(horizon), self)
    }

    fn report(&self) {
        self.board.publish(DriftStatus {
            horizon: self.monitor.horizon(),
            state: self.monitor.state(),
            tracked_version: self.monitor.tracked_version(),
            consecutive_breaches: self.monitor.consecutive_breaches(),
            pending_pairs: self.monitor.pending_pairs(),
            last_window: self.last_window.clone(),
        });
    }

    fn on_event(&mut self, event: GridEvent) -> Result<(), DriftWorkerError> {
        match event {
            GridEvent::ModelActivated(notice) => {
                let baseline = notice.metrics.baseline(self.monitor.config().metric);
                self.monitor.track_model(notice.version_id, baseline)?;
                info!(
                    horizon = %notice.horizon,
                    version = %notice.version_id,
                    baseline,
                    rollback = notice.rollback,
                    "drift monitor tracking new model"
                );
            }
            GridEvent::OutcomeObserved(pair) => {
                let observation = self.monitor.observe(&pair, Utc::now())?;
                if observation.ignored {
                    debug!(horizon = %pair.horizon, version = %pair.model_version, "pair from untracked model ignored");
                }
                // The monitor is already RETRAIN_PENDING; the trigger must go out
                // even if the history write below fails.
                if let Some(trigger) = observation.trigger {
                    warn!(
                        horizon = %trigger.horizon,
                        version = %trigger.model_version,
                        trigger = %trigger.trigger_id,
                        "sustained drift detected; retrain requested"
                    );
                    self.retrain.submit(trigger);
                }
                if let Some(stat) = observation.closed_window {
                    debug!(
                        horizon = %stat.horizon,
                        observed_error = stat.observed_error,
                        baseline_error = stat.baseline_error,
                        breached = stat.breached,
                        "drift window closed"
                    );
                    self.last_window = Some(stat.clone());
                    self.history.append(stat)?;
                }
            }
            GridEvent::ForecastIssued(_) => {}
        }
        Ok(())
    }
}

impl StreamHandler for DriftWorker {
    type Error = DriftWorkerError;

    fn handle(&mut self, envelope: EventEnvelope<GridEvent>) -> Result<(), DriftWorkerError> {
        let result = self.on_event(envelope.into_payload());
        self.report();
        result
    }

    fn idle(&mut self) {
        let before = self.monitor.state();
        self.monitor.tick(Utc::now());
        if self.monitor.state() != before {
            info!(horizon = %self.monitor.horizon(), "retrain cooldown elapsed; monitoring resumed");
            self.report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use gridcast_core::{ArtifactMetrics, ObservedPair};
    use gridcast_events::ModelActivated;
    use uuid::Uuid;

    use crate::drift_history::InMemoryDriftHistory;
    use crate::training::InMemoryRetrainSink;

    fn at(step: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap() + Duration::minutes(15 * step)
    }

    fn envelope(seq: u64, event: GridEvent) -> EventEnvelope<GridEvent> {
        EventEnvelope::new(Uuid::now_v7(), event.horizon(), seq, event)
    }

    fn activated(version_id: VersionId) -> GridEvent {
        GridEvent::ModelActivated(ModelActivated {
            horizon: Horizon::HOUR_1,
            version_id,
            metrics: ArtifactMetrics {
                mae: 10.0,
                rmse: 12.0,
                mape: 0.01,
                peak_load_error: 20.0,
            },
            previous: None,
            rollback: false,
            activated_at: at(0),
        })
    }

    fn pair(version: VersionId, step: i64, abs_error: f64) -> GridEvent {
        GridEvent::OutcomeObserved(ObservedPair {
            horizon: Horizon::HOUR_1,
            model_version: version,
            target_timestamp: at(step),
            predicted: 100.0,
            actual: 100.0 + abs_error,
        })
    }

    #[test]
    fn breaching_windows_are_recorded_and_trigger_once() {
        let history = Arc::new(InMemoryDriftHistory::new());
        let retrain = Arc::new(InMemoryRetrainSink::new());
        let board = Arc::new(DriftStatusBoard::new());
        let config = DriftConfig {
            window_size: 2,
            consecutive_breaches: 3,
            ..DriftConfig::default()
        };
        let mut worker =
            DriftWorker::new(Horizon::HOUR_1, config, history.clone(), retrain.clone(), board.clone()).unwrap();

        let v1 = VersionId::new();
        let mut seq = 1;
        worker.handle(envelope(seq, activated(v1))).unwrap();

        for (step, err) in [16.0, 17.0, 15.0, 20.0].into_iter().flat_map(|e| [e, e]).enumerate() {
            seq += 1;
            worker.handle(envelope(seq, pair(v1, step as i64, err))).unwrap();
        }

        let stats = history.list(Horizon::HOUR_1, None).unwrap();
        assert_eq!(stats.len(), 4);
        assert!(stats.iter().all(|s| s.breached));
        assert_eq!(retrain.all().len(), 1);
        assert_eq!(retrain.all()[0].window_range.start, at(0));
        assert_eq!(retrain.all()[0].window_range.end, at(5));

        let status = board.get(Horizon::HOUR_1).unwrap();
        assert!(matches!(status.state, DriftState::RetrainPending { .. }));
        assert_eq!(status.tracked_version, Some(v1));
        assert_eq!(status.last_window, stats.last().cloned());
    }

    #[test]
    fn activation_resets_and_untracked_pairs_are_ignored() {
        let history = Arc::new(InMemoryDriftHistory::new());
        let board = Arc::new(DriftStatusBoard::new());
        let config = DriftConfig {
            window_size: 1,
            ..DriftConfig::default()
        };
        let mut worker = DriftWorker::new(
            Horizon::HOUR_1,
            config,
            history.clone(),
            Arc::new(InMemoryRetrainSink::new()),
            board.clone(),
        )
        .unwrap();

        let (v1, v2) = (VersionId::new(), VersionId::new());
        worker.handle(envelope(1, activated(v1))).unwrap();
        worker.handle(envelope(2, pair(v1, 0, 50.0))).unwrap();
        assert_eq!(board.get(Horizon::HOUR_1).unwrap().consecutive_breaches, 1);

        worker.handle(envelope(3, activated(v2))).unwrap();
        worker.handle(envelope(4, pair(v1, 1, 50.0))).unwrap();

        let status = board.get(Horizon::HOUR_1).unwrap();
        assert_eq!(status.tracked_version, Some(v2));
        assert_eq!(status.consecutive_breaches, 0);
        assert_eq!(history.list(Horizon::HOUR_1, None).unwrap().len(), 1);
    }

    struct UnavailableHistory;

    impl DriftHistoryStore for UnavailableHistory {
        fn append(&self, _stat: DriftWindowStat) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("drift_windows offline".to_string()))
        }

        fn list(&self, _horizon: Horizon, _limit: Option<usize>) -> Result<Vec<DriftWindowStat>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn trigger_is_delivered_when_history_write_fails() {
        let retrain = Arc::new(InMemoryRetrainSink::new());
        let board = Arc::new(DriftStatusBoard::new());
        let config = DriftConfig {
            window_size: 1,
            consecutive_breaches: 3,
            ..DriftConfig::default()
        };
        let mut worker = DriftWorker::new(
            Horizon::HOUR_1,
            config,
            Arc::new(UnavailableHistory),
            retrain.clone(),
            board.clone(),
        )
        .unwrap();

        let v1 = VersionId::new();
        worker.handle(envelope(1, activated(v1))).unwrap();
        for step in 0..6 {
            let result = worker.handle(envelope(step as u64 + 2, pair(v1, step, 30.0)));
            assert!(matches!(result, Err(DriftWorkerError::History(_))));
        }

        assert_eq!(retrain.all().len(), 1);
        assert_eq!(retrain.all()[0].model_version, v1);
        let status = board.get(Horizon::HOUR_1).unwrap();
        assert!(matches!(status.state, DriftState::RetrainPending { .. }));
    }
}
