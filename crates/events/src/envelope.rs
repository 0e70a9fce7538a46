use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gridcast_core::Horizon;

/// Envelope for a published event.
///
/// - `horizon` scopes the message; per-horizon workers filter on it.
/// - `sequence_number` increases monotonically per publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    horizon: Horizon,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(event_id: Uuid, horizon: Horizon, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id,
            horizon,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
