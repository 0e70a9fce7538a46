use thiserror::Error;

use gridcast_core::{ArtifactStatus, Horizon, SchemaVersion, VersionId};

use crate::journal::JournalError;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("invalid transition for {version_id}: {from} -> {to}")]
    InvalidTransition {
        version_id: VersionId,
        from: ArtifactStatus,
        to: ArtifactStatus,
    },

    #[error("no prior version to roll back to for horizon {0}")]
    NoPriorVersion(Horizon),

    #[error("no active model for horizon {0}")]
    ModelUnavailable(Horizon),

    #[error("unknown model version {0}")]
    UnknownVersion(VersionId),

    #[error("model version {0} is already registered")]
    DuplicateVersion(VersionId),

    #[error("unrecognized feature schema {0}")]
    UnrecognizedSchema(SchemaVersion),

    #[error("validation rejected {version_id}: {reason}")]
    ValidationRejected { version_id: VersionId, reason: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("registry journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("registry lock poisoned")]
    Poisoned,
}

impl RegistryError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::InvalidTransition { .. } => "invalid_transition",
            RegistryError::NoPriorVersion(_) => "no_prior_version",
            RegistryError::ModelUnavailable(_) => "model_unavailable",
            RegistryError::UnknownVersion(_) => "unknown_version",
            RegistryError::DuplicateVersion(_) => "duplicate_version",
            RegistryError::UnrecognizedSchema(_) => "unrecognized_schema",
            RegistryError::ValidationRejected { .. } | RegistryError::Validation(_) => "validation_error",
            RegistryError::Journal(_) | RegistryError::Poisoned => "store_error",
        }
    }
}
