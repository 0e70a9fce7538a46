//! Decision-support boundary: forecasts in, demand-response signals out.
//!
//! The rule catalog lives behind [`DecisionPolicy`]; the relay only moves
//! forecasts to the policy and signals to the sink.

use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::info;

use gridcast_core::{DecisionSignal, ForecastResult, Horizon};
use gridcast_events::{EventEnvelope, GridEvent, Subscription};

use super::stream_worker::{StreamHandler, StreamWorker, WorkerHandle};

pub trait DecisionPolicy: Send + Sync {
    /// `None` means no action for this forecast.
    fn decide(&self, forecast: &ForecastResult, now: DateTime<Utc>) -> Option<DecisionSignal>;
}

pub trait DecisionSink: Send + Sync {
    fn emit(&self, signal: DecisionSignal);
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDecisionSink {
    inner: Mutex<Vec<DecisionSignal>>,
}

impl InMemoryDecisionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<DecisionSignal> {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Signals not yet expired at `now`.
    pub fn live(&self, now: DateTime<Utc>) -> Vec<DecisionSignal> {
        self.all().into_iter().filter(|s| !s.is_expired(now)).collect()
    }
}

impl DecisionSink for InMemoryDecisionSink {
    fn emit(&self, signal: DecisionSignal) {
        if let Ok(mut signals) = self.inner.lock() {
            signals.push(signal);
        }
    }
}

pub struct DecisionRelay {
    policy: Arc<dyn DecisionPolicy>,
    sink: Arc<dyn DecisionSink>,
}

impl DecisionRelay {
    pub fn new(policy: Arc<dyn DecisionPolicy>, sink: Arc<dyn DecisionSink>) -> Self {
        Self { policy, sink }
    }

    /// `horizon = None` relays every horizon.
    pub fn spawn(
        self,
        subscription: Subscription<EventEnvelope<GridEvent>>,
        horizon: Option<Horizon>,
    ) -> io::Result<WorkerHandle> {
        StreamWorker::spawn("decision-relay", subscription, horizon, self)
    }

    pub fn relay(&self, forecast: &ForecastResult) {
        if let Some(signal) = self.policy.decide(forecast, Utc::now()) {
            info!(
                horizon = %signal.horizon,
                action = ?signal.action,
                magnitude = signal.magnitude,
                "decision signal emitted"
            );
            self.sink.emit(signal);
        }
    }
}

impl StreamHandler for DecisionRelay {
    type Error = core::convert::Infallible;

    fn handle(&mut self, envelope: EventEnvelope<GridEvent>) -> Result<(), Self::Error> {
        if let GridEvent::ForecastIssued(forecast) = envelope.payload() {
            self.relay(forecast);
        }
        Ok(())
    }
}
