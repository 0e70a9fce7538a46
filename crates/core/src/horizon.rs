//! Forecast horizon (lead time).

use core::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Forecast lead time in whole minutes.
///
/// Serialized in its textual form (`15m`, `1h`, `24h`) so it can key JSON maps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Horizon {
    minutes: u32,
}

impl Horizon {
    pub const MINUTES_15: Horizon = Horizon { minutes: 15 };
    pub const HOUR_1: Horizon = Horizon { minutes: 60 };
    pub const DAY_1: Horizon = Horizon { minutes: 24 * 60 };

    pub fn from_minutes(minutes: u32) -> DomainResult<Self> {
        if minutes == 0 {
            return Err(DomainError::validation("horizon must be positive"));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }

    /// Number of grid steps covered by this horizon at `resolution_minutes`.
    pub fn steps(&self, resolution_minutes: u32) -> DomainResult<u32> {
        if resolution_minutes == 0 || self.minutes % resolution_minutes != 0 {
            return Err(DomainError::validation(format!(
                "horizon {self} is not a whole multiple of the {resolution_minutes}m resolution"
            )));
        }
        Ok(self.minutes / resolution_minutes)
    }
}

impl core::fmt::Display for Horizon {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.minutes % 60 == 0 {
            write!(f, "{}h", self.minutes / 60)
        } else {
            write!(f, "{}m", self.minutes)
        }
    }
}

impl FromStr for Horizon {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| DomainError::validation(format!("horizon '{s}' is missing a unit")))?;
        let (value, unit) = s.split_at(split);
        let value: u32 = value
            .parse()
            .map_err(|_| DomainError::validation(format!("horizon '{s}' has no numeric value")))?;

        let factor = match unit {
            "m" | "min" => 1,
            "h" => 60,
            "d" => 24 * 60,
            _ => {
                return Err(DomainError::validation(format!(
                    "horizon '{s}' has unknown unit '{unit}' (expected m, h or d)"
                )));
            }
        };

        let minutes = value
            .checked_mul(factor)
            .ok_or_else(|| DomainError::validation(format!("horizon '{s}' is too large")))?;
        Horizon::from_minutes(minutes)
    }
}

impl TryFrom<String> for Horizon {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Horizon> for String {
    fn from(value: Horizon) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_common_horizons() {
        assert_eq!("15m".parse::<Horizon>().unwrap(), Horizon::MINUTES_15);
        assert_eq!("1h".parse::<Horizon>().unwrap(), Horizon::HOUR_1);
        assert_eq!("24h".parse::<Horizon>().unwrap(), Horizon::DAY_1);
        assert_eq!("1d".parse::<Horizon>().unwrap(), Horizon::DAY_1);

        assert_eq!(Horizon::MINUTES_15.to_string(), "15m");
        assert_eq!(Horizon::HOUR_1.to_string(), "1h");
        assert_eq!(Horizon::DAY_1.to_string(), "24h");
    }

    #[test]
    fn rejects_zero_and_unknown_units() {
        assert!("0m".parse::<Horizon>().is_err());
        assert!("5w".parse::<Horizon>().is_err());
        assert!("h".parse::<Horizon>().is_err());
        assert!("15".parse::<Horizon>().is_err());
    }

    #[test]
    fn steps_require_whole_multiples() {
        assert_eq!(Horizon::HOUR_1.steps(15).unwrap(), 4);
        assert_eq!(Horizon::DAY_1.steps(15).unwrap(), 96);
        assert!(Horizon::from_minutes(20).unwrap().steps(15).is_err());
    }

    #[test]
    fn serializes_as_text() {
        let json = serde_json::to_string(&Horizon::HOUR_1).unwrap();
        assert_eq!(json, "\"1h\"");
        let back: Horizon = serde_json::from_str("\"24h\"").unwrap();
        assert_eq!(back, Horizon::DAY_1);
    }
}
