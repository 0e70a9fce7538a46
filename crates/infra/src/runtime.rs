//! Model runtime boundary: turns a feature vector into a load prediction.
//!
//! The artifact's `runtime` descriptor tells the runtime how to score it.
//! [`BaselineRuntime`] understands two descriptors:
//!
//! ```text
//! null | {"kind":"persistence"}                     -> lag_1
//! {"kind":"persistence","feature":"lag_96"}         -> lag_96
//! {"kind":"linear","intercept":0.0,"weights":{...}} -> intercept + sum(w * x)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use gridcast_core::ModelArtifact;
use gridcast_features::FeatureVector;
use gridcast_registry::ArtifactCheck;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("unsupported runtime descriptor: {0}")]
    UnsupportedDescriptor(String),

    #[error("feature '{0}' required by the model is missing")]
    MissingFeature(String),

    #[error("model produced a non-finite prediction ({0})")]
    NonFinite(f64),
}

/// External model-inference call.
pub trait ModelRuntime: Send + Sync {
    fn predict(&self, artifact: &ModelArtifact, features: &FeatureVector) -> Result<f64, RuntimeError>;

    /// Whether this runtime can load `descriptor` at all.
    fn check_descriptor(&self, _descriptor: &JsonValue) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Rejects artifacts at registration whose descriptor the runtime cannot load.
pub struct DescriptorCheck {
    runtime: Arc<dyn ModelRuntime>,
}

impl DescriptorCheck {
    pub fn new(runtime: Arc<dyn ModelRuntime>) -> Self {
        Self { runtime }
    }
}

impl ArtifactCheck for DescriptorCheck {
    fn check(&self, artifact: &ModelArtifact) -> Result<(), String> {
        self.runtime
            .check_descriptor(artifact.runtime())
            .map_err(|e| e.to_string())
    }
}

/// Runtime descriptor understood by [`BaselineRuntime`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaselineModel {
    Persistence {
        #[serde(default = "default_persistence_feature")]
        feature: String,
    },
    Linear {
        #[serde(default)]
        intercept: f64,
        weights: BTreeMap<String, f64>,
    },
}

fn default_persistence_feature() -> String {
    "lag_1".to_string()
}

impl Default for BaselineModel {
    fn default() -> Self {
        BaselineModel::Persistence {
            feature: default_persistence_feature(),
        }
    }
}

impl BaselineModel {
    pub fn from_descriptor(descriptor: &JsonValue) -> Result<Self, RuntimeError> {
        if descriptor.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(descriptor.clone())
            .map_err(|e| RuntimeError::UnsupportedDescriptor(e.to_string()))
    }

    pub fn to_descriptor(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    pub fn score(&self, features: &FeatureVector) -> Result<f64, RuntimeError> {
        let value = match self {
            BaselineModel::Persistence { feature } => features
                .get(feature)
                .ok_or_else(|| RuntimeError::MissingFeature(feature.clone()))?,
            BaselineModel::Linear { intercept, weights } => {
                let mut acc = *intercept;
                for (name, w) in weights {
                    let x = features
                        .get(name)
                        .ok_or_else(|| RuntimeError::MissingFeature(name.clone()))?;
                    acc += w * x;
                }
                acc
            }
        };
        if !value.is_finite() {
            return Err(RuntimeError::NonFinite(value));
        }
        Ok(value)
    }
}

/// In-process runtime for persistence and linear models.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaselineRuntime;

impl ModelRuntime for BaselineRuntime {
    fn predict(&self, artifact: &ModelArtifact, features: &FeatureVector) -> Result<f64, RuntimeError> {
        BaselineModel::from_descriptor(artifact.runtime())?.score(features)
    }

    fn check_descriptor(&self, descriptor: &JsonValue) -> Result<(), RuntimeError> {
        BaselineModel::from_descriptor(descriptor).map(|_| ())
    }
}
