use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridcast_core::{ArtifactMetrics, ForecastResult, Horizon, ObservedPair, VersionId};

use crate::Event;

/// A model became the ACTIVE artifact for its horizon (promotion or rollback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelActivated {
    pub horizon: Horizon,
    pub version_id: VersionId,
    pub metrics: ArtifactMetrics,
    /// The artifact that was ACTIVE before the swap, if any.
    pub previous: Option<VersionId>,
    pub rollback: bool,
    pub activated_at: DateTime<Utc>,
}

/// Messages carried on the grid stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridEvent {
    ForecastIssued(ForecastResult),
    OutcomeObserved(ObservedPair),
    ModelActivated(ModelActivated),
}

impl GridEvent {
    pub fn horizon(&self) -> Horizon {
        match self {
            GridEvent::ForecastIssued(r) => r.horizon,
            GridEvent::OutcomeObserved(p) => p.horizon,
            GridEvent::ModelActivated(a) => a.horizon,
        }
    }
}

impl Event for GridEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GridEvent::ForecastIssued(_) => "forecast.issued",
            GridEvent::OutcomeObserved(_) => "forecast.outcome_observed",
            GridEvent::ModelActivated(_) => "registry.model_activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GridEvent::ForecastIssued(r) => r.generated_at,
            GridEvent::OutcomeObserved(p) => p.target_timestamp,
            GridEvent::ModelActivated(a) => a.activated_at,
        }
    }
}
