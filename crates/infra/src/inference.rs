//! Inference Service: the serving path for forecast requests.
//!
//! ```text
//! request
//!   -> active artifact (lock-free registry read)
//!   -> schema requirement check
//!   -> causal record window (bounded by as_of and the store watermark)
//!   -> feature vector
//!   -> model runtime
//!   -> ForecastResult (+ ForecastIssued on the stream, + outcome join)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use gridcast_core::{ForecastRequest, ForecastResult, Horizon, ModelArtifact, SchemaVersion};
use gridcast_events::{GridEvent, GridStream};
use gridcast_features::{FeatureError, FeaturePipeline};
use gridcast_registry::{ModelRegistry, RegistryError, RegistryJournal};

use crate::outcome::OutcomeJoiner;
use crate::record_store::{RecordStore, StoreError};
use crate::runtime::{ModelRuntime, RuntimeError};

/// Cooperative cancellation flag shared between a caller and a forecast.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<(), ForecastError> {
        if self.is_cancelled() {
            Err(ForecastError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient causal history: {0}")]
    FeatureGap(FeatureError),

    #[error("schema mismatch: model expects {expected}, pipeline produces {found}")]
    SchemaMismatch {
        expected: SchemaVersion,
        found: SchemaVersion,
    },

    #[error("no active model for horizon {0}")]
    ModelUnavailable(Horizon),

    #[error("forecast cancelled")]
    Cancelled,

    #[error("model inference failed: {0}")]
    InferenceFailed(#[from] RuntimeError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("registry error: {0}")]
    Registry(RegistryError),

    #[error("invalid forecast request: {0}")]
    InvalidInput(String),
}

impl ForecastError {
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::FeatureGap(_) => "feature_gap",
            ForecastError::SchemaMismatch { .. } => "schema_mismatch",
            ForecastError::ModelUnavailable(_) => "model_unavailable",
            ForecastError::Cancelled => "cancelled",
            ForecastError::InferenceFailed(_) => "inference_failed",
            ForecastError::Store(_) => "store_error",
            ForecastError::Registry(e) => e.kind(),
            ForecastError::InvalidInput(_) => "validation_error",
        }
    }
}

impl From<RegistryError> for ForecastError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::ModelUnavailable(h) => ForecastError::ModelUnavailable(h),
            other => ForecastError::Registry(other),
        }
    }
}

impl From<FeatureError> for ForecastError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::Gap { .. } => ForecastError::FeatureGap(e),
            FeatureError::Validation(msg) => ForecastError::InvalidInput(msg),
        }
    }
}

pub struct InferenceService<J> {
    registry: Arc<ModelRegistry<J>>,
    pipeline: Arc<FeaturePipeline>,
    store: Arc<dyn RecordStore>,
    runtime: Arc<dyn ModelRuntime>,
    stream: Arc<dyn GridStream>,
    joiner: Arc<OutcomeJoiner>,
}

impl<J> core::fmt::Debug for InferenceService<J> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InferenceService")
            .field("schema_version", self.pipeline.schema_version())
            .finish()
    }
}

impl<J> InferenceService<J>
where
    J: RegistryJournal,
{
    pub fn new(
        registry: Arc<ModelRegistry<J>>,
        pipeline: Arc<FeaturePipeline>,
        store: Arc<dyn RecordStore>,
        runtime: Arc<dyn ModelRuntime>,
        stream: Arc<dyn GridStream>,
        joiner: Arc<OutcomeJoiner>,
    ) -> Self {
        Self {
            registry,
            pipeline,
            store,
            runtime,
            stream,
            joiner,
        }
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn forecast(&self, request: ForecastRequest) -> Result<ForecastResult, ForecastError> {
        self.forecast_with_cancel(request, &CancellationToken::new())
    }

    /// As [`forecast`](Self::forecast), abandoning the request once `cancel`
    /// is set. A cancelled forecast has no side effects.
    #[instrument(skip(self, cancel), fields(horizon = %request.horizon, as_of = %request.as_of_timestamp))]
    pub fn forecast_with_cancel(
        &self,
        request: ForecastRequest,
        cancel: &CancellationToken,
    ) -> Result<ForecastResult, ForecastError> {
        let horizon = request.horizon;
        let as_of = request.as_of_timestamp;
        horizon
            .steps(self.pipeline.config().resolution_minutes)
            .map_err(|e| ForecastError::InvalidInput(e.to_string()))?;

        cancel.check()?;
        let artifact = self.registry.get_active(horizon)?;
        let generated_at = Utc::now();
        self.require_schema(&artifact, self.pipeline.schema_version())?;

        let records = self
            .store
            .range(self.pipeline.window_start(as_of, horizon), as_of)?;
        cancel.check()?;

        let features = self.pipeline.compute(&records, as_of, horizon)?;
        self.require_schema(&artifact, &features.schema_version)?;
        cancel.check()?;

        let predicted_load = self.runtime.predict(&artifact, &features)?;
        if !predicted_load.is_finite() {
            return Err(RuntimeError::NonFinite(predicted_load).into());
        }
        cancel.check()?;

        let result = ForecastResult {
            horizon,
            predicted_load,
            model_version: artifact.version_id(),
            generated_at,
            as_of_timestamp: as_of,
            target_timestamp: request.target_timestamp(),
            schema_version: artifact.schema_version().clone(),
        };
        self.deliver(&result);
        debug!(version = %result.model_version, predicted_load, "forecast issued");
        Ok(result)
    }

    fn require_schema(&self, artifact: &ModelArtifact, found: &SchemaVersion) -> Result<(), ForecastError> {
        if artifact.schema_version() == found {
            return Ok(());
        }
        error!(
            horizon = %artifact.horizon(),
            version = %artifact.version_id(),
            expected = %artifact.schema_version(),
            found = %found,
            "feature schema mismatch between active model and pipeline"
        );
        Err(ForecastError::SchemaMismatch {
            expected: artifact.schema_version().clone(),
            found: found.clone(),
        })
    }

    // The forecast is already computed; delivery problems never fail it.
    fn deliver(&self, result: &ForecastResult) {
        if let Err(e) = self.stream.publish(GridEvent::ForecastIssued(result.clone())) {
            warn!(version = %result.model_version, error = ?e, "forecast not published");
        }
        if let Err(e) = self.joiner.forecast_issued(result) {
            warn!(version = %result.model_version, error = ?e, "forecast not queued for outcome join");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use gridcast_core::{ArtifactMetrics, ModelArtifact, TimeRange, TimeSeriesRecord, VersionId};
    use gridcast_events::{EventEnvelope, InMemoryEventBus, SequencedPublisher};
    use gridcast_features::FeatureConfig;
    use gridcast_registry::InMemoryRegistryJournal;

    use crate::record_store::InMemoryRecordStore;
    use crate::runtime::BaselineRuntime;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<GridEvent>>>;

    fn at(step: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap() + Duration::minutes(15 * step)
    }

    struct Fixture {
        registry: Arc<ModelRegistry<InMemoryRegistryJournal>>,
        store: Arc<InMemoryRecordStore>,
        service: InferenceService<InMemoryRegistryJournal>,
        publisher: Arc<SequencedPublisher<Bus>>,
    }

    fn fixture(history: i64) -> Fixture {
        let pipeline = Arc::new(FeaturePipeline::new(FeatureConfig::default()).unwrap());
        let registry = Arc::new(
            ModelRegistry::open(InMemoryRegistryJournal::new(), [pipeline.schema_version().clone()]).unwrap(),
        );
        let store = Arc::new(InMemoryRecordStore::new());
        for i in 0..history {
            store.append(TimeSeriesRecord::new(at(i), 500.0 + i as f64)).unwrap();
        }
        let publisher = Arc::new(SequencedPublisher::new(Bus::default()));
        let joiner = Arc::new(OutcomeJoiner::new(store.clone(), publisher.clone()));
        let service = InferenceService::new(
            registry.clone(),
            pipeline,
            store.clone(),
            Arc::new(BaselineRuntime),
            publisher.clone(),
            joiner,
        );
        Fixture {
            registry,
            store,
            service,
            publisher,
        }
    }

    fn activate(f: &Fixture, horizon: Horizon, schema: SchemaVersion) -> VersionId {
        let artifact = ModelArtifact::staged(
            VersionId::new(),
            horizon,
            schema,
            TimeRange::new(at(0), at(1)).unwrap(),
            ArtifactMetrics {
                mae: 10.0,
                rmse: 12.0,
                mape: 0.02,
                peak_load_error: 30.0,
            },
            at(1),
        );
        let id = artifact.version_id();
        f.registry.register(artifact).unwrap();
        f.registry.validate(id).unwrap();
        f.registry.promote(id).unwrap();
        id
    }

    #[test]
    fn forecast_is_stamped_with_the_active_version() {
        let f = fixture(200);
        let schema = f.service.pipeline().schema_version().clone();
        let v1 = activate(&f, Horizon::HOUR_1, schema);
        let sub = f.publisher.subscribe();

        let r = f.service.forecast(ForecastRequest::new(at(150), Horizon::HOUR_1)).unwrap();
        assert_eq!(r.model_version, v1);
        assert_eq!(r.predicted_load, 500.0 + 149.0);
        assert_eq!(r.target_timestamp, at(154));

        let kinds: Vec<_> = std::iter::from_fn(|| sub.try_recv().ok())
            .map(|e| e.into_payload())
            .collect();
        // Target 154 is already stored, so the pair is joined immediately.
        assert!(matches!(kinds[0], GridEvent::ForecastIssued(_)));
        assert!(matches!(kinds[1], GridEvent::OutcomeObserved(ref p) if p.actual == 654.0));
    }

    #[test]
    fn empty_registry_is_model_unavailable() {
        let f = fixture(200);
        let err = f.service.forecast(ForecastRequest::new(at(150), Horizon::DAY_1)).unwrap_err();
        assert_eq!(err, ForecastError::ModelUnavailable(Horizon::DAY_1));
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[test]
    fn schema_mismatch_is_fatal() {
        let f = fixture(200);
        let stale = SchemaVersion::new("fs-0000000000000000");
        f.registry.recognize_schema(stale.clone()).unwrap();
        activate(&f, Horizon::HOUR_1, stale.clone());

        let err = f.service.forecast(ForecastRequest::new(at(150), Horizon::HOUR_1)).unwrap_err();
        assert_eq!(
            err,
            ForecastError::SchemaMismatch {
                expected: stale,
                found: f.service.pipeline().schema_version().clone(),
            }
        );
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn short_history_is_a_feature_gap() {
        let f = fixture(50);
        let schema = f.service.pipeline().schema_version().clone();
        activate(&f, Horizon::HOUR_1, schema);
        let err = f.service.forecast(ForecastRequest::new(at(50), Horizon::HOUR_1)).unwrap_err();
        assert_eq!(err.kind(), "feature_gap");
    }

    #[test]
    fn records_after_the_watermark_or_as_of_are_never_read() {
        let f = fixture(200);
        let schema = f.service.pipeline().schema_version().clone();
        activate(&f, Horizon::HOUR_1, schema);

        let before = f.service.forecast(ForecastRequest::new(at(120), Horizon::HOUR_1)).unwrap();
        f.store.append(TimeSeriesRecord::new(at(500), 9_999.0)).unwrap();
        let after = f.service.forecast(ForecastRequest::new(at(120), Horizon::HOUR_1)).unwrap();
        assert_eq!(before.predicted_load, after.predicted_load);
    }

    #[test]
    fn cancelled_forecast_has_no_side_effects() {
        let f = fixture(200);
        let schema = f.service.pipeline().schema_version().clone();
        activate(&f, Horizon::HOUR_1, schema);
        let sub = f.publisher.subscribe();

        let token = CancellationToken::new();
        token.cancel();
        let err = f
            .service
            .forecast_with_cancel(ForecastRequest::new(at(150), Horizon::HOUR_1), &token)
            .unwrap_err();
        assert_eq!(err, ForecastError::Cancelled);
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn horizon_off_the_grid_is_invalid() {
        let f = fixture(10);
        let h = Horizon::from_minutes(20).unwrap();
        let err = f.service.forecast(ForecastRequest::new(at(5), h)).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }
}
