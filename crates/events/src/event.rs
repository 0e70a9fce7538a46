use chrono::{DateTime, Utc};

/// An immutable, versioned fact.
///
/// Implemented by stream messages and by registry journal events.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "registry.artifact.promoted").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
