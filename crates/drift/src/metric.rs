use gridcast_core::{ErrorMetric, ObservedPair};

/// Error of a window of pairs under `metric`. Zero for an empty window.
pub fn observed_error(pairs: &[ObservedPair], metric: ErrorMetric) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let n = pairs.len() as f64;
    match metric {
        ErrorMetric::Mae => pairs.iter().map(|p| p.residual().abs()).sum::<f64>() / n,
        ErrorMetric::Rmse => (pairs.iter().map(|p| p.residual().powi(2)).sum::<f64>() / n).sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gridcast_core::{Horizon, VersionId};

    fn pair(predicted: f64, actual: f64) -> ObservedPair {
        ObservedPair {
            horizon: Horizon::HOUR_1,
            model_version: VersionId::new(),
            target_timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            predicted,
            actual,
        }
    }

    #[test]
    fn mae_and_rmse() {
        let pairs = [pair(10.0, 13.0), pair(10.0, 6.0)];
        assert_eq!(observed_error(&pairs, ErrorMetric::Mae), 3.5);
        assert!((observed_error(&pairs, ErrorMetric::Rmse) - 12.5f64.sqrt()).abs() < 1e-12);
    }
}
