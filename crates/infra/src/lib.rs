//! `gridcast-infra`: storage, services and workers around the pure core.
//!
//! - [`record_store`]: append-only records with a safe-to-read watermark
//! - [`inference`]: the forecast serving path
//! - [`outcome`]: joins forecasts with observed actuals
//! - [`workers`]: drift monitoring and decision relay on the event stream
//! - [`training`]: training-set builder and trainer/retrain boundaries
//! - [`postgres`]: persistent backends (feature `postgres`)

pub mod config;
pub mod drift_history;
pub mod inference;
pub mod ingest;
pub mod node;
pub mod outcome;
pub mod record_store;
pub mod runtime;
pub mod training;
pub mod workers;

#[cfg(feature = "postgres")]
pub mod postgres;


pub use config::GridcastConfig;
pub use drift_history::{DriftHistoryStore, InMemoryDriftHistory};
pub use inference::{CancellationToken, ForecastError, InferenceService};
pub use ingest::{IngestError, IngestReport, IngestionService, RejectedRecord};
pub use node::{Backends, GridcastNode, NodeError};
pub use outcome::OutcomeJoiner;
pub use record_store::{InMemoryRecordStore, RecordStore, StoreError};
pub use runtime::{BaselineModel, BaselineRuntime, DescriptorCheck, ModelRuntime, RuntimeError};
pub use training::{
    InMemoryRetrainSink, PersistenceTrainer, RetrainSink, TrainingBackend, TrainingError, TrainingRow, TrainingSet,
    TrainingSetBuilder, ValidationOutcome,
};
