//! `gridcast-core`: shared data model for the forecasting core.
//!
//! This crate contains **pure** types (no IO, no clocks, no locks). Every other
//! crate in the workspace speaks in these types.

pub mod aggregate;
pub mod artifact;
pub mod decision;
pub mod drift;
pub mod error;
pub mod forecast;
pub mod horizon;
pub mod id;
pub mod record;
pub mod time;

pub use aggregate::{Aggregate, ExpectedVersion};
pub use artifact::{ArtifactMetrics, ArtifactStatus, ModelArtifact, SchemaVersion};
pub use decision::{DecisionSignal, DemandResponseAction};
pub use drift::{DriftWindowStat, ErrorMetric, RetrainTrigger};
pub use error::{DomainError, DomainResult};
pub use forecast::{ForecastRequest, ForecastResult, ObservedPair};
pub use horizon::Horizon;
pub use id::{TriggerId, VersionId};
pub use record::TimeSeriesRecord;
pub use time::TimeRange;
