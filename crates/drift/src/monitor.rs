//! Per-horizon drift state machine.
//!
//! ```text
//!             K consecutive breaching windows
//! MONITORING ────────────────────────────────> RETRAIN_PENDING
//!     ^                                               │
//!     └──── new model tracked, or cooldown elapsed ───┘
//! ```
//!
//! Windows are tumbling blocks of `window_size` pairs in arrival order. While
//! pending, windows still close and are reported but never count toward a
//! new trigger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridcast_core::{
    DriftWindowStat, Horizon, ObservedPair, RetrainTrigger, TimeRange, TriggerId, VersionId,
};

use crate::config::DriftConfig;
use crate::error::DriftError;
use crate::metric::observed_error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftState {
    Monitoring,
    RetrainPending {
        trigger_id: TriggerId,
        since: DateTime<Utc>,
    },
}

/// What one observed pair produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    /// The pair was not attributed to the tracked model and was dropped.
    pub ignored: bool,
    pub closed_window: Option<DriftWindowStat>,
    pub trigger: Option<RetrainTrigger>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct TrackedModel {
    version_id: VersionId,
    baseline_error: f64,
}

#[derive(Debug, Clone)]
pub struct DriftMonitor {
    horizon: Horizon,
    config: DriftConfig,
    tracked: Option<TrackedModel>,
    window: Vec<ObservedPair>,
    consecutive: u32,
    /// Range covered by the current breach run.
    run: Option<TimeRange>,
    state: DriftState,
}

impl DriftMonitor {
    pub fn new(horizon: Horizon, config: DriftConfig) -> Result<Self, DriftError> {
        config.validate()?;
        Ok(Self {
            horizon,
            config,
            tracked: None,
            window: Vec::with_capacity(config.window_size),
            consecutive: 0,
            run: None,
            state: DriftState::Monitoring,
        })
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn state(&self) -> DriftState {
        self.state
    }

    pub fn consecutive_breaches(&self) -> u32 {
        self.consecutive
    }

    pub fn tracked_version(&self) -> Option<VersionId> {
        self.tracked.map(|t| t.version_id)
    }

    pub fn pending_pairs(&self) -> usize {
        self.window.len()
    }

    /// Start monitoring a newly activated model. Clears the open window, the
    /// breach run and any pending retrain.
    pub fn track_model(&mut self, version_id: VersionId, baseline_error: f64) -> Result<(), DriftError> {
        if !(baseline_error.is_finite() && baseline_error >= 0.0) {
            return Err(DriftError::InvalidPair(format!(
                "baseline error must be finite and non-negative (got {baseline_error})"
            )));
        }
        self.tracked = Some(TrackedModel {
            version_id,
            baseline_error,
        });
        self.window.clear();
        self.reset_run();
        self.state = DriftState::Monitoring;
        Ok(())
    }

    /// Leave RETRAIN_PENDING if the cooldown has elapsed at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let DriftState::RetrainPending { since, .. } = self.state {
            if now - since >= self.config.cooldown() {
                self.state = DriftState::Monitoring;
                self.reset_run();
            }
        }
    }

    pub fn observe(&mut self, pair: &ObservedPair, now: DateTime<Utc>) -> Result<Observation, DriftError> {
        if pair.horizon != self.horizon {
            return Err(DriftError::HorizonMismatch {
                expected: self.horizon,
                found: pair.horizon,
            });
        }
        if !(pair.predicted.is_finite() && pair.actual.is_finite()) {
            return Err(DriftError::InvalidPair(format!(
                "non-finite value for target {}",
                pair.target_timestamp
            )));
        }

        let Some(tracked) = self.tracked.filter(|t| t.version_id == pair.model_version) else {
            return Ok(Observation {
                ignored: true,
                ..Observation::default()
            });
        };

        self.tick(now);
        self.window.push(*pair);
        if self.window.len() < self.config.window_size {
            return Ok(Observation::default());
        }

        let stat = self.close_window(tracked);
        let trigger = self.evaluate(&stat, now);
        Ok(Observation {
            ignored: false,
            closed_window: Some(stat),
            trigger,
        })
    }

    fn close_window(&mut self, tracked: TrackedModel) -> DriftWindowStat {
        let pairs = std::mem::take(&mut self.window);
        let observed = observed_error(&pairs, self.config.metric);
        let threshold = tracked.baseline_error * self.config.threshold_ratio;

        let (start, end) = pairs.iter().fold(
            (pairs[0].target_timestamp, pairs[0].target_timestamp),
            |(lo, hi), p| (lo.min(p.target_timestamp), hi.max(p.target_timestamp)),
        );

        DriftWindowStat {
            horizon: self.horizon,
            window_start: start,
            window_end: end,
            observed_error: observed,
            model_version: tracked.version_id,
            baseline_error: tracked.baseline_error,
            metric: self.config.metric,
            // Inclusive: an error sitting exactly on the threshold counts as a breach.
            breached: observed >= threshold,
        }
    }

    fn evaluate(&mut self, stat: &DriftWindowStat, now: DateTime<Utc>) -> Option<RetrainTrigger> {
        if matches!(self.state, DriftState::RetrainPending { .. }) {
            return None;
        }
        if !stat.breached {
            self.reset_run();
            return None;
        }

        self.consecutive += 1;
        let run = match self.run {
            Some(r) => TimeRange {
                start: r.start.min(stat.window_start),
                end: r.end.max(stat.window_end),
            },
            None => TimeRange {
                start: stat.window_start,
                end: stat.window_end,
            },
        };
        self.run = Some(run);

        if self.consecutive < self.config.consecutive_breaches {
            return None;
        }

        let trigger = RetrainTrigger::drift(self.horizon, run, stat.model_version, now);
        self.state = DriftState::RetrainPending {
            trigger_id: trigger.trigger_id,
            since: now,
        };
        self.reset_run();
        Some(trigger)
    }

    fn reset_run(&mut self) {
        self.consecutive = 0;
        self.run = None;
    }
}
