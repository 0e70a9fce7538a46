//! `gridcast-events`: the stream that ties the components together.
//!
//! Forecasts, observed outcomes and model activations travel as
//! [`EventEnvelope<GridEvent>`] over an [`EventBus`]. Producers never hold a
//! reference to their consumers.

pub mod bus;
pub mod cursor;
pub mod envelope;
pub mod event;
pub mod horizon_scope;
pub mod in_memory_bus;
pub mod publisher;
pub mod stream;

pub use bus::{EventBus, Subscription};
pub use cursor::{CursorError, StreamCursor};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use horizon_scope::HorizonScoped;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use publisher::{GridStream, PublishError, SequencedPublisher};
pub use stream::{GridEvent, ModelActivated};
