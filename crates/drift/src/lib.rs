//! `gridcast-drift`: the Drift Monitor state machine.
//!
//! One [`DriftMonitor`] per horizon. It is pure: observed pairs and the
//! current time are passed in, window statistics and retrain triggers come
//! out. Threading, persistence and delivery live in `gridcast-infra`.

pub mod config;
pub mod error;
pub mod metric;
pub mod monitor;

pub use config::DriftConfig;
pub use error::DriftError;
pub use metric::observed_error;
pub use monitor::{DriftMonitor, DriftState, Observation};
