//! Background workers consuming the grid event stream.

pub mod decision_relay;
pub mod drift_worker;
pub mod stream_worker;

pub use decision_relay::{DecisionPolicy, DecisionRelay, DecisionSink, InMemoryDecisionSink};
pub use drift_worker::{DriftStatus, DriftStatusBoard, DriftWorker, DriftWorkerError};
pub use stream_worker::{StreamHandler, StreamWorker, WorkerHandle};
