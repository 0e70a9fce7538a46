//! Training boundary: training-set construction and the trainer/retrain
//! interfaces.
//!
//! Training rows are built with the same [`FeaturePipeline`] the inference
//! service uses, so a model never sees a feature computed differently at
//! serving time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use gridcast_core::{
    ArtifactMetrics, Horizon, ModelArtifact, RetrainTrigger, SchemaVersion, TimeRange, TimeSeriesRecord,
    VersionId,
};
use gridcast_features::{FeatureError, FeaturePipeline, FeatureVector};
use gridcast_registry::ValidationPolicy;

use crate::record_store::{RecordStore, StoreError};
use crate::runtime::{BaselineModel, RuntimeError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainingError {
    #[error("training set for {0} is empty")]
    EmptyTrainingSet(Horizon),

    #[error("invalid training input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One supervised example: features at `as_of`, load at `as_of + horizon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub features: FeatureVector,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    pub horizon: Horizon,
    pub schema_version: SchemaVersion,
    pub window: TimeRange,
    pub rows: Vec<TrainingRow>,
    /// `as_of` points dropped for a feature gap or a missing target.
    pub skipped: usize,
}

pub struct TrainingSetBuilder<S> {
    pipeline: Arc<FeaturePipeline>,
    store: S,
}

impl<S> TrainingSetBuilder<S>
where
    S: RecordStore,
{
    pub fn new(pipeline: Arc<FeaturePipeline>, store: S) -> Self {
        Self { pipeline, store }
    }

    /// Rows for every grid-aligned `as_of` in `window` (inclusive).
    pub fn build(&self, horizon: Horizon, window: TimeRange) -> Result<TrainingSet, TrainingError> {
        horizon
            .steps(self.pipeline.config().resolution_minutes)
            .map_err(|e| TrainingError::InvalidInput(e.to_string()))?;

        let resolution = self.pipeline.resolution();
        let start = self.pipeline.window_start(window.start, horizon);
        let end = window.end + horizon.duration() + resolution;
        let records = self.store.range(start, end)?;

        let mut rows = Vec::new();
        let mut skipped = 0;
        let mut as_of = window.start;

        while as_of <= window.end {
            match self.row_at(&records, as_of, horizon) {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => skipped += 1,
                Err(FeatureError::Gap { missing_at, .. }) => {
                    debug!(horizon = %horizon, as_of = %as_of, missing_at = %missing_at, "training row skipped");
                    skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
            as_of += resolution;
        }

        Ok(TrainingSet {
            horizon,
            schema_version: self.pipeline.schema_version().clone(),
            window,
            rows,
            skipped,
        })
    }

    fn row_at(
        &self,
        records: &[TimeSeriesRecord],
        as_of: DateTime<Utc>,
        horizon: Horizon,
    ) -> Result<Option<TrainingRow>, FeatureError> {
        let target_at = as_of + horizon.duration();
        let Ok(target) = records.binary_search_by_key(&target_at, |r| r.timestamp) else {
            return Ok(None);
        };

        let lo = records.partition_point(|r| r.timestamp < self.pipeline.window_start(as_of, horizon));
        let hi = records.partition_point(|r| r.timestamp < as_of);
        let features = self.pipeline.compute(&records[lo..hi], as_of, horizon)?;

        Ok(Some(TrainingRow {
            features,
            target: records[target].actual_load,
        }))
    }
}

/// Offline verdict on a trained artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    Validated,
    Rejected { reason: String },
}

/// External training backend.
pub trait TrainingBackend: Send + Sync {
    /// Fit a model; the artifact comes back STAGED.
    fn train(&self, set: &TrainingSet, config: &JsonValue) -> Result<ModelArtifact, TrainingError>;

    fn validate(&self, artifact: &ModelArtifact) -> ValidationOutcome;
}

/// Accuracy metrics for `(predicted, actual)` pairs.
pub fn evaluate(pairs: &[(f64, f64)]) -> ArtifactMetrics {
    if pairs.is_empty() {
        return ArtifactMetrics {
            mae: 0.0,
            rmse: 0.0,
            mape: 0.0,
            peak_load_error: 0.0,
        };
    }

    let n = pairs.len() as f64;
    let mae = pairs.iter().map(|(p, a)| (a - p).abs()).sum::<f64>() / n;
    let rmse = (pairs.iter().map(|(p, a)| (a - p).powi(2)).sum::<f64>() / n).sqrt();

    let relative: Vec<f64> = pairs
        .iter()
        .filter(|(_, a)| *a != 0.0)
        .map(|(p, a)| ((a - p) / a).abs())
        .collect();
    let mape = if relative.is_empty() {
        0.0
    } else {
        relative.iter().sum::<f64>() / relative.len() as f64
    };

    let peak_load_error = pairs
        .iter()
        .max_by(|x, y| x.1.total_cmp(&y.1))
        .map_or(0.0, |(p, a)| (a - p).abs());

    ArtifactMetrics {
        mae,
        rmse,
        mape,
        peak_load_error,
    }
}

/// Reference trainer: fits a persistence model on one lag feature.
///
/// `config` may name the feature (`{"feature": "lag_96"}`); the default is
/// `lag_1`. Validation applies `policy` to the in-sample metrics.
#[derive(Debug, Clone, Default)]
pub struct PersistenceTrainer {
    policy: ValidationPolicy,
}

impl PersistenceTrainer {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }
}

impl TrainingBackend for PersistenceTrainer {
    fn train(&self, set: &TrainingSet, config: &JsonValue) -> Result<ModelArtifact, TrainingError> {
        if set.rows.is_empty() {
            return Err(TrainingError::EmptyTrainingSet(set.horizon));
        }

        let model = match config.get("feature").and_then(JsonValue::as_str) {
            Some(feature) => BaselineModel::Persistence {
                feature: feature.to_string(),
            },
            None => BaselineModel::default(),
        };

        let pairs = set
            .rows
            .iter()
            .map(|row| Ok((model.score(&row.features)?, row.target)))
            .collect::<Result<Vec<_>, RuntimeError>>()?;
        let metrics = evaluate(&pairs);

        let artifact = ModelArtifact::staged(
            VersionId::new(),
            set.horizon,
            set.schema_version.clone(),
            set.window,
            metrics,
            Utc::now(),
        )
        .with_runtime(model.to_descriptor());

        info!(
            horizon = %set.horizon,
            version = %artifact.version_id(),
            rows = set.rows.len(),
            mae = metrics.mae,
            "persistence model trained"
        );
        Ok(artifact)
    }

    fn validate(&self, artifact: &ModelArtifact) -> ValidationOutcome {
        match self.policy.check(artifact.metrics()) {
            Ok(()) => ValidationOutcome::Validated,
            Err(reason) => ValidationOutcome::Rejected { reason },
        }
    }
}

/// Delivery of retrain triggers to the training backend.
///
/// The drift worker submits fire-and-forget; triggers stay queued until the
/// training backend claims them. A claimed trigger is never handed out again.
pub trait RetrainSink: Send + Sync {
    fn submit(&self, trigger: RetrainTrigger);

    /// Remove and return up to `limit` queued triggers, oldest first.
    fn claim(&self, limit: usize) -> Result<Vec<RetrainTrigger>, StoreError>;
}

impl<S> RetrainSink for Arc<S>
where
    S: RetrainSink + ?Sized,
{
    fn submit(&self, trigger: RetrainTrigger) {
        (**self).submit(trigger)
    }

    fn claim(&self, limit: usize) -> Result<Vec<RetrainTrigger>, StoreError> {
        (**self).claim(limit)
    }
}

/// Unclaimed triggers kept by [`InMemoryRetrainSink`]; older ones are dropped.
pub const MAX_QUEUED_TRIGGERS: usize = 1024;

/// In-memory queue for tests/dev. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryRetrainSink {
    inner: Mutex<VecDeque<RetrainTrigger>>,
}

impl InMemoryRetrainSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued (unclaimed) triggers, oldest first.
    pub fn all(&self) -> Vec<RetrainTrigger> {
        self.inner
            .lock()
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl RetrainSink for InMemoryRetrainSink {
    fn submit(&self, trigger: RetrainTrigger) {
        info!(
            horizon = %trigger.horizon,
            trigger = %trigger.trigger_id,
            model = %trigger.model_version,
            reason = %trigger.reason,
            "retrain requested"
        );
        if let Ok(mut queue) = self.inner.lock() {
            if queue.len() == MAX_QUEUED_TRIGGERS {
                if let Some(dropped) = queue.pop_front() {
                    warn!(trigger = %dropped.trigger_id, horizon = %dropped.horizon, "retrain queue full; oldest trigger dropped");
                }
            }
            queue.push_back(trigger);
        }
    }

    fn claim(&self, limit: usize) -> Result<Vec<RetrainTrigger>, StoreError> {
        let mut queue = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("retrain queue lock poisoned".to_string()))?;
        let n = limit.min(queue.len());
        Ok(queue.drain(..n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use gridcast_core::ArtifactStatus;
    use gridcast_features::FeatureConfig;
    use serde_json::json;

    use crate::record_store::InMemoryRecordStore;

    fn at(step: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap() + Duration::minutes(15 * step)
    }

    fn pipeline() -> Arc<FeaturePipeline> {
        Arc::new(FeaturePipeline::new(FeatureConfig::default()).unwrap())
    }

    fn store(n: i64) -> Arc<InMemoryRecordStore> {
        let s = Arc::new(InMemoryRecordStore::new());
        for i in 0..n {
            s.append(TimeSeriesRecord::new(at(i), 1_000.0 + i as f64)).unwrap();
        }
        s
    }

    #[test]
    fn rows_match_serving_features_and_future_targets() {
        let pipeline = pipeline();
        let store = store(200);
        let builder = TrainingSetBuilder::new(pipeline.clone(), store.clone());
        let window = TimeRange::new(at(100), at(110)).unwrap();

        let set = builder.build(Horizon::HOUR_1, window).unwrap();
        assert_eq!(set.rows.len(), 11);
        assert_eq!(set.skipped, 0);
        assert_eq!(&set.schema_version, pipeline.schema_version());

        let first = &set.rows[0];
        let history = store.range(pipeline.window_start(at(100), Horizon::HOUR_1), at(100)).unwrap();
        let serving = pipeline.compute(&history, at(100), Horizon::HOUR_1).unwrap();
        assert_eq!(first.features, serving);
        assert_eq!(first.target, 1_104.0);
    }

    #[test]
    fn points_without_history_or_target_are_skipped() {
        let builder = TrainingSetBuilder::new(pipeline(), store(120));
        // 90..=95 lack lag_96 history; 116..=119 lack a target.
        let set = builder
            .build(Horizon::HOUR_1, TimeRange::new(at(90), at(119)).unwrap())
            .unwrap();
        assert_eq!(set.rows.len(), 30 - 6 - 4);
        assert_eq!(set.skipped, 6 + 4);
    }

    #[test]
    fn persistence_trainer_stages_artifact_with_metrics() {
        let builder = TrainingSetBuilder::new(pipeline(), store(200));
        let set = builder
            .build(Horizon::HOUR_1, TimeRange::new(at(100), at(150)).unwrap())
            .unwrap();

        let trainer = PersistenceTrainer::new(ValidationPolicy {
            max_mae: Some(4.0),
            ..ValidationPolicy::default()
        });
        let artifact = trainer.train(&set, &json!({})).unwrap();
        assert_eq!(artifact.status(), ArtifactStatus::Staged);
        assert_eq!(artifact.horizon(), Horizon::HOUR_1);
        // Linear ramp: lag_1 is always 5 steps behind the 1h target.
        assert_eq!(artifact.metrics().mae, 5.0);
        assert_eq!(
            trainer.validate(&artifact),
            ValidationOutcome::Rejected {
                reason: "mae 5 exceeds 4".to_string()
            }
        );

        let lenient = PersistenceTrainer::default();
        assert_eq!(lenient.validate(&artifact), ValidationOutcome::Validated);
    }

    #[test]
    fn empty_set_cannot_be_trained() {
        let set = TrainingSet {
            horizon: Horizon::DAY_1,
            schema_version: SchemaVersion::new("fs-x"),
            window: TimeRange::new(at(0), at(1)).unwrap(),
            rows: Vec::new(),
            skipped: 2,
        };
        assert_eq!(
            PersistenceTrainer::default().train(&set, &JsonValue::Null),
            Err(TrainingError::EmptyTrainingSet(Horizon::DAY_1))
        );
    }

    #[test]
    fn metrics_cover_relative_and_peak_error() {
        let m = evaluate(&[(90.0, 100.0), (210.0, 200.0)]);
        assert_eq!(m.mae, 10.0);
        assert_eq!(m.rmse, 10.0);
        assert!((m.mape - 0.075).abs() < 1e-12);
        assert_eq!(m.peak_load_error, 10.0);
    }

    #[test]
    fn retrain_sink_keeps_submissions() {
        let sink = InMemoryRetrainSink::new();
        let trigger = RetrainTrigger::drift(
            Horizon::HOUR_1,
            TimeRange::new(at(0), at(10)).unwrap(),
            VersionId::new(),
            at(10),
        );
        sink.submit(trigger.clone());
        assert_eq!(sink.all(), vec![trigger.clone()]);

        assert_eq!(sink.claim(10).unwrap(), vec![trigger]);
        assert!(sink.claim(10).unwrap().is_empty());
        assert!(sink.all().is_empty());
    }

    #[test]
    fn retrain_queue_is_bounded_and_claims_oldest_first() {
        let sink = InMemoryRetrainSink::new();
        let triggers: Vec<RetrainTrigger> = (0..MAX_QUEUED_TRIGGERS as i64 + 2)
            .map(|i| {
                RetrainTrigger::drift(
                    Horizon::HOUR_1,
                    TimeRange::new(at(i), at(i + 1)).unwrap(),
                    VersionId::new(),
                    at(i + 1),
                )
            })
            .collect();
        for t in &triggers {
            sink.submit(t.clone());
        }

        assert_eq!(sink.all().len(), MAX_QUEUED_TRIGGERS);
        let first = sink.claim(2).unwrap();
        assert_eq!(first, triggers[2..4].to_vec());
        assert_eq!(sink.all().len(), MAX_QUEUED_TRIGGERS - 2);
    }
}
