use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::horizon::Horizon;

/// Demand-response action class carried by a decision signal.
///
/// The rule catalog that picks an action lives outside the core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandResponseAction {
    /// Reduce load (curtailment request).
    Curtail,
    /// Move flexible load to another period.
    Shift,
    /// Bring additional generation or storage online.
    Dispatch,
    /// No action.
    Hold,
}

/// Operational signal derived from a forecast. Output only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSignal {
    pub horizon: Horizon,
    pub issued_at: DateTime<Utc>,
    pub action: DemandResponseAction,
    pub magnitude: f64,
    pub expires_at: DateTime<Utc>,
}

impl DecisionSignal {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
