use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// One smart-meter observation (one dispatch block).
///
/// Immutable once ingested: stores hand out clones, never mutable references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub timestamp: DateTime<Utc>,
    pub actual_load: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intraday_forecast: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_ahead_forecast: Option<f64>,
    /// Auxiliary signals such as temperature or a holiday flag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exogenous: BTreeMap<String, f64>,
}

impl TimeSeriesRecord {
    pub fn new(timestamp: DateTime<Utc>, actual_load: f64) -> Self {
        Self {
            timestamp,
            actual_load,
            intraday_forecast: None,
            day_ahead_forecast: None,
            exogenous: BTreeMap::new(),
        }
    }

    pub fn with_intraday_forecast(mut self, value: f64) -> Self {
        self.intraday_forecast = Some(value);
        self
    }

    pub fn with_day_ahead_forecast(mut self, value: f64) -> Self {
        self.day_ahead_forecast = Some(value);
        self
    }

    pub fn with_exogenous(mut self, name: impl Into<String>, value: f64) -> Self {
        self.exogenous.insert(name.into(), value);
        self
    }

    /// Reject malformed records (non-finite numbers, blank exogenous names).
    pub fn validate(&self) -> DomainResult<()> {
        if !self.actual_load.is_finite() {
            return Err(DomainError::validation(format!(
                "actual_load at {} is not finite",
                self.timestamp
            )));
        }
        for (name, value) in [
            ("intraday_forecast", self.intraday_forecast),
            ("day_ahead_forecast", self.day_ahead_forecast),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(DomainError::validation(format!(
                        "{name} at {} is not finite",
                        self.timestamp
                    )));
                }
            }
        }
        for (name, value) in &self.exogenous {
            if name.trim().is_empty() {
                return Err(DomainError::validation("exogenous feature name cannot be empty"));
            }
            if !value.is_finite() {
                return Err(DomainError::validation(format!(
                    "exogenous '{name}' at {} is not finite",
                    self.timestamp
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn finite_record_is_valid() {
        let r = TimeSeriesRecord::new(ts(), 41_250.0)
            .with_intraday_forecast(41_000.0)
            .with_exogenous("temperature", 12.5);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn non_finite_values_are_malformed() {
        assert!(TimeSeriesRecord::new(ts(), f64::NAN).validate().is_err());
        assert!(
            TimeSeriesRecord::new(ts(), 1.0)
                .with_day_ahead_forecast(f64::INFINITY)
                .validate()
                .is_err()
        );
        assert!(
            TimeSeriesRecord::new(ts(), 1.0)
                .with_exogenous("holiday", f64::NAN)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let r: TimeSeriesRecord = serde_json::from_str(
            r#"{"timestamp":"2026-01-01T00:00:00Z","actual_load":100.0}"#,
        )
        .unwrap();
        assert_eq!(r.intraday_forecast, None);
        assert!(r.exogenous.is_empty());
    }
}
