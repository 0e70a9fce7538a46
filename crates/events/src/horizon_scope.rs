use gridcast_core::Horizon;

use crate::EventEnvelope;

/// Messages that belong to exactly one forecast horizon.
///
/// Per-horizon workers use this to ignore traffic for other horizons, which is
/// what makes each horizon's drift state single-writer.
pub trait HorizonScoped {
    fn horizon(&self) -> Horizon;
}

impl<E> HorizonScoped for EventEnvelope<E> {
    fn horizon(&self) -> Horizon {
        EventEnvelope::horizon(self)
    }
}
