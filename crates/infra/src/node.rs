//! Composition root: wires one process's services around a shared stream.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use gridcast_drift::DriftError;
use gridcast_events::{EventEnvelope, GridEvent, GridStream, InMemoryEventBus, SequencedPublisher};
use gridcast_features::{FeatureError, FeaturePipeline};
use gridcast_registry::{ModelRegistry, RegistryError, RegistryJournal};

use crate::config::GridcastConfig;
use crate::drift_history::DriftHistoryStore;
use crate::inference::InferenceService;
use crate::ingest::IngestionService;
use crate::outcome::OutcomeJoiner;
use crate::record_store::RecordStore;
use crate::runtime::{DescriptorCheck, ModelRuntime};
use crate::training::RetrainSink;
use crate::workers::{DecisionPolicy, DecisionRelay, DecisionSink, DriftStatusBoard, DriftWorker, WorkerHandle};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("feature pipeline: {0}")]
    Features(#[from] FeatureError),

    #[error("model registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("drift monitor: {0}")]
    Drift(#[from] DriftError),

    #[error("worker spawn failed: {0}")]
    Io(#[from] io::Error),
}

/// Storage backends a node runs on.
pub struct Backends<J> {
    pub journal: J,
    pub records: Arc<dyn RecordStore>,
    pub drift_history: Arc<dyn DriftHistoryStore>,
    pub retrain: Arc<dyn RetrainSink>,
    pub runtime: Arc<dyn ModelRuntime>,
}

pub struct GridcastNode<J> {
    pub config: GridcastConfig,
    pub pipeline: Arc<FeaturePipeline>,
    pub registry: Arc<ModelRegistry<J>>,
    pub records: Arc<dyn RecordStore>,
    pub drift_history: Arc<dyn DriftHistoryStore>,
    pub retrain: Arc<dyn RetrainSink>,
    pub stream: Arc<dyn GridStream>,
    pub inference: Arc<InferenceService<J>>,
    pub ingestion: Arc<IngestionService>,
    pub drift_board: Arc<DriftStatusBoard>,
}

impl<J> core::fmt::Debug for GridcastNode<J> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GridcastNode")
            .field("schema_version", self.pipeline.schema_version())
            .field("horizons", &self.config.horizons)
            .finish()
    }
}

impl<J> GridcastNode<J>
where
    J: RegistryJournal,
{
    /// Build every service; the registry is replayed from `backends.journal`.
    pub fn assemble(config: GridcastConfig, backends: Backends<J>) -> Result<Self, NodeError> {
        let pipeline = Arc::new(FeaturePipeline::new(config.features.clone())?);

        let bus: Arc<InMemoryEventBus<EventEnvelope<GridEvent>>> = Arc::new(InMemoryEventBus::new());
        let publisher = Arc::new(SequencedPublisher::new(bus));

        let registry = Arc::new(
            ModelRegistry::open(backends.journal, [pipeline.schema_version().clone()])?
                .with_activation_sink(publisher.clone())
                .with_artifact_check(Arc::new(DescriptorCheck::new(backends.runtime.clone()))),
        );
        let stream: Arc<dyn GridStream> = publisher;

        let joiner = Arc::new(OutcomeJoiner::new(backends.records.clone(), stream.clone()));
        let inference = Arc::new(InferenceService::new(
            registry.clone(),
            pipeline.clone(),
            backends.records.clone(),
            backends.runtime,
            stream.clone(),
            joiner.clone(),
        ));
        let ingestion = Arc::new(
            IngestionService::new(backends.records.clone(), joiner).with_retention(config.retention()),
        );

        info!(
            schema_version = %pipeline.schema_version(),
            registry_version = registry.version(),
            "gridcast node assembled"
        );

        Ok(Self {
            config,
            pipeline,
            registry,
            records: backends.records,
            drift_history: backends.drift_history,
            retrain: backends.retrain,
            stream,
            inference,
            ingestion,
            drift_board: Arc::new(DriftStatusBoard::new()),
        })
    }

    /// One drift worker per configured horizon, seeded with the current ACTIVE model.
    pub fn start_drift_workers(&self) -> Result<Vec<WorkerHandle>, NodeError> {
        let mut handles = Vec::with_capacity(self.config.horizons.len());
        for &horizon in &self.config.horizons {
            let subscription = self.stream.subscribe();
            let mut worker = DriftWorker::new(
                horizon,
                self.config.drift,
                self.drift_history.clone(),
                self.retrain.clone(),
                self.drift_board.clone(),
            )?;
            if let Ok(active) = self.registry.get_active(horizon) {
                worker.track(&active)?;
            }
            handles.push(worker.spawn(subscription)?);
        }
        info!(workers = handles.len(), "drift workers started");
        Ok(handles)
    }

    /// Relay every horizon's forecasts through `policy` into `sink`.
    pub fn start_decision_relay(
        &self,
        policy: Arc<dyn DecisionPolicy>,
        sink: Arc<dyn DecisionSink>,
    ) -> Result<WorkerHandle, NodeError> {
        let handle = DecisionRelay::new(policy, sink).spawn(self.stream.subscribe(), None)?;
        info!("decision relay started");
        Ok(handle)
    }
}
