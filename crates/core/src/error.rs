//! Domain error model.

use thiserror::Error;

/// Result type used across the data model.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failures of the pure data model.
///
/// Component failures (feature gaps, registry transitions, schema skew) have
/// their own error types in their crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: non-finite loads, off-grid horizons, inverted ranges.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Stale expected version on an aggregate append.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
