use thiserror::Error;

use gridcast_core::Horizon;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriftError {
    #[error("invalid drift config: {0}")]
    InvalidConfig(String),

    #[error("pair for horizon {found} sent to the {expected} monitor")]
    HorizonMismatch { expected: Horizon, found: Horizon },

    #[error("invalid observed pair: {0}")]
    InvalidPair(String),
}
