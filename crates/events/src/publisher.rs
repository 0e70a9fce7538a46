use std::sync::Mutex;

use uuid::Uuid;

use crate::bus::{EventBus, Subscription};
use crate::envelope::EventEnvelope;
use crate::stream::GridEvent;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("publisher lock poisoned")]
    Poisoned,

    #[error("bus rejected message: {0}")]
    Bus(String),
}

/// Wraps grid events in envelopes and publishes them in sequence order.
///
/// Sequence assignment and publication happen under one lock, so a consumer
/// never sees sequence `n + 1` before `n`. Share one publisher per bus.
#[derive(Debug)]
pub struct SequencedPublisher<B> {
    bus: B,
    last_sequence_number: Mutex<u64>,
}

impl<B> SequencedPublisher<B>
where
    B: EventBus<EventEnvelope<GridEvent>>,
{
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            last_sequence_number: Mutex::new(0),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn subscribe(&self) -> Subscription<EventEnvelope<GridEvent>> {
        self.bus.subscribe()
    }

    /// Publish one event; returns the sequence number it was assigned.
    pub fn publish(&self, event: GridEvent) -> Result<u64, PublishError> {
        let mut last = self
            .last_sequence_number
            .lock()
            .map_err(|_| PublishError::Poisoned)?;

        let sequence_number = *last + 1;
        let envelope = EventEnvelope::new(Uuid::now_v7(), event.horizon(), sequence_number, event);
        self.bus
            .publish(envelope)
            .map_err(|e| PublishError::Bus(format!("{e:?}")))?;

        *last = sequence_number;
        Ok(sequence_number)
    }
}

/// Object-safe view of a publisher, for services that should not carry the
/// bus type around.
pub trait GridStream: Send + Sync {
    fn publish(&self, event: GridEvent) -> Result<u64, PublishError>;

    fn subscribe(&self) -> Subscription<EventEnvelope<GridEvent>>;
}

impl<B> GridStream for SequencedPublisher<B>
where
    B: EventBus<EventEnvelope<GridEvent>>,
{
    fn publish(&self, event: GridEvent) -> Result<u64, PublishError> {
        SequencedPublisher::publish(self, event)
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<GridEvent>> {
        SequencedPublisher::subscribe(self)
    }
}
