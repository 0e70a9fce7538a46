use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridcast_core::{Horizon, SchemaVersion};

/// Model input for one `(as_of, horizon)` pair.
///
/// `values` is keyed by feature name; the ordered map keeps iteration (and so
/// any flattening into a model's input row) deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub as_of_timestamp: DateTime<Utc>,
    pub horizon: Horizon,
    pub schema_version: SchemaVersion,
    pub values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
