use tracing::warn;

use gridcast_core::ModelArtifact;
use gridcast_events::{EventBus, EventEnvelope, GridEvent, ModelActivated, SequencedPublisher};

/// Pre-registration check on an artifact's payload, run before the command
/// reaches the catalog. `Err` carries the rejection reason.
pub trait ArtifactCheck: Send + Sync {
    fn check(&self, artifact: &ModelArtifact) -> Result<(), String>;
}

/// Receives activation notices after the registry commits them.
///
/// Called with the registry's writer lock held, so notices arrive in commit
/// order. Implementations must not block and must not call back into the
/// registry.
pub trait ActivationSink: Send + Sync {
    fn activated(&self, notice: &ModelActivated);
}

impl<B> ActivationSink for SequencedPublisher<B>
where
    B: EventBus<EventEnvelope<GridEvent>>,
{
    fn activated(&self, notice: &ModelActivated) {
        // The activation is already durable; a lost notice only delays drift tracking.
        if let Err(e) = self.publish(GridEvent::ModelActivated(notice.clone())) {
            warn!(
                horizon = %notice.horizon,
                version = %notice.version_id,
                error = ?e,
                "activation notice not published"
            );
        }
    }
}
