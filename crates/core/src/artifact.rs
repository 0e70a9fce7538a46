//! Model artifacts as tracked by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::drift::ErrorMetric;
use crate::error::{DomainError, DomainResult};
use crate::horizon::Horizon;
use crate::id::VersionId;
use crate::time::TimeRange;

/// Identifier of the exact feature definition set a vector was built with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an artifact.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Staged,
    Validated,
    Active,
    Retired,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Staged => "STAGED",
            ArtifactStatus::Validated => "VALIDATED",
            ArtifactStatus::Active => "ACTIVE",
            ArtifactStatus::Retired => "RETIRED",
        }
    }
}

impl core::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation-time accuracy metrics recorded by the trainer.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub peak_load_error: f64,
}

impl ArtifactMetrics {
    pub fn validate(&self) -> DomainResult<()> {
        for (name, v) in [
            ("mae", self.mae),
            ("rmse", self.rmse),
            ("mape", self.mape),
            ("peak_load_error", self.peak_load_error),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(DomainError::validation(format!(
                    "metric {name} must be a finite non-negative number (got {v})"
                )));
            }
        }
        Ok(())
    }

    /// Baseline error for drift monitoring under the given metric.
    pub fn baseline(&self, metric: ErrorMetric) -> f64 {
        match metric {
            ErrorMetric::Mae => self.mae,
            ErrorMetric::Rmse => self.rmse,
        }
    }
}

/// A trained model version for one horizon.
///
/// Immutable except for `status`, which only the registry transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    version_id: VersionId,
    horizon: Horizon,
    schema_version: SchemaVersion,
    trained_window: TimeRange,
    metrics: ArtifactMetrics,
    status: ArtifactStatus,
    created_at: DateTime<Utc>,
    /// Opaque runtime descriptor (e.g. weights location) for the model runtime.
    #[serde(default)]
    runtime: JsonValue,
}

impl ModelArtifact {
    /// New artifact as produced by a trainer (always STAGED).
    pub fn staged(
        version_id: VersionId,
        horizon: Horizon,
        schema_version: SchemaVersion,
        trained_window: TimeRange,
        metrics: ArtifactMetrics,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version_id,
            horizon,
            schema_version,
            trained_window,
            metrics,
            status: ArtifactStatus::Staged,
            created_at,
            runtime: JsonValue::Null,
        }
    }

    pub fn with_runtime(mut self, runtime: JsonValue) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn version_id(&self) -> VersionId {
        self.version_id
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    pub fn trained_window(&self) -> TimeRange {
        self.trained_window
    }

    pub fn metrics(&self) -> &ArtifactMetrics {
        &self.metrics
    }

    pub fn status(&self) -> ArtifactStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn runtime(&self) -> &JsonValue {
        &self.runtime
    }

    /// Copy of this artifact carrying a different status.
    pub fn with_status(&self, status: ArtifactStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}
