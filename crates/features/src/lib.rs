//! `gridcast-features`: the Feature Pipeline.
//!
//! A pure, deterministic transform from a causal window of
//! [`TimeSeriesRecord`](gridcast_core::TimeSeriesRecord)s into a
//! [`FeatureVector`]. Training and serving both build vectors through
//! [`FeaturePipeline::compute`]; the [`SchemaVersion`](gridcast_core::SchemaVersion)
//! stamped on every vector is the fingerprint of the feature definitions, so
//! any divergence between the two sides is detectable.
//!
//! No IO, no clocks, no shared state. Safe to call from any number of threads.

pub mod calendar;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod stats;
pub mod vector;
mod window;

pub use config::{FeatureConfig, ImputationPolicy};
pub use error::{FeatureError, FeatureResult};
pub use pipeline::FeaturePipeline;
pub use schema::schema_version_of;
pub use vector::FeatureVector;
