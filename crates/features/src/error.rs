use chrono::{DateTime, Utc};
use thiserror::Error;

pub type FeatureResult<T> = Result<T, FeatureError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    /// A required lag or rolling slot has no usable record in the causal window.
    #[error("feature gap: no record for step {step} ({missing_at}) before as_of {as_of}")]
    Gap {
        as_of: DateTime<Utc>,
        missing_at: DateTime<Utc>,
        step: u32,
    },

    /// Malformed input window or feature configuration.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl FeatureError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
