//! Temporal encodings derived from `as_of` alone.

use std::f64::consts::TAU;

use chrono::{DateTime, Datelike, Timelike, Utc};

pub const HOUR: &str = "hour";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const MINUTE_OF_DAY_SIN: &str = "minute_of_day_sin";
pub const MINUTE_OF_DAY_COS: &str = "minute_of_day_cos";
pub const DAY_OF_WEEK_SIN: &str = "day_of_week_sin";
pub const DAY_OF_WEEK_COS: &str = "day_of_week_cos";

pub const NAMES: [&str; 6] = [
    HOUR,
    DAY_OF_WEEK,
    MINUTE_OF_DAY_SIN,
    MINUTE_OF_DAY_COS,
    DAY_OF_WEEK_SIN,
    DAY_OF_WEEK_COS,
];

const MINUTES_PER_DAY: f64 = 1440.0;

/// Calendar features for `as_of` (UTC). Monday is day 0.
pub fn encode(as_of: DateTime<Utc>) -> [(&'static str, f64); 6] {
    let hour = as_of.hour();
    let minute_of_day = f64::from(hour * 60 + as_of.minute());
    let dow = f64::from(as_of.weekday().num_days_from_monday());

    let day_angle = TAU * minute_of_day / MINUTES_PER_DAY;
    let week_angle = TAU * dow / 7.0;

    [
        (HOUR, f64::from(hour)),
        (DAY_OF_WEEK, dow),
        (MINUTE_OF_DAY_SIN, day_angle.sin()),
        (MINUTE_OF_DAY_COS, day_angle.cos()),
        (DAY_OF_WEEK_SIN, week_angle.sin()),
        (DAY_OF_WEEK_COS, week_angle.cos()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn midnight_monday_is_the_origin() {
        // 2026-01-05 is a Monday.
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let f = encode(t);
        assert_eq!(f[0], (HOUR, 0.0));
        assert_eq!(f[1], (DAY_OF_WEEK, 0.0));
        assert!(f[2].1.abs() < 1e-12);
        assert!((f[3].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn six_am_is_a_quarter_turn() {
        let t = Utc.with_ymd_and_hms(2026, 1, 7, 6, 0, 0).unwrap();
        let f = encode(t);
        assert_eq!(f[0].1, 6.0);
        assert_eq!(f[1].1, 2.0);
        assert!((f[2].1 - 1.0).abs() < 1e-12);
        assert!(f[3].1.abs() < 1e-12);
    }
}
