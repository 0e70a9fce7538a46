//! Process configuration.
//!
//! Resolution order: defaults, then the JSON file named by `GRIDCAST_CONFIG`
//! (if set), then individual `GRIDCAST_*` environment overrides.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use gridcast_core::Horizon;
use gridcast_drift::DriftConfig;
use gridcast_features::FeatureConfig;
use gridcast_observability::LogFormat;
use gridcast_registry::ValidationPolicy;

pub const CONFIG_PATH_VAR: &str = "GRIDCAST_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridcastConfig {
    pub bind_addr: String,
    pub log_format: LogFormat,
    pub features: FeatureConfig,
    pub drift: DriftConfig,
    /// Horizons served and monitored.
    pub horizons: Vec<Horizon>,
    /// Records older than this many days behind the watermark are archived.
    pub retention_days: u32,
    /// Limits applied by `POST /models/:version/validate`.
    pub validation: ValidationPolicy,
    /// Postgres persistence when set (requires the `postgres` feature).
    pub database_url: Option<String>,
}

impl Default for GridcastConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_format: LogFormat::Json,
            features: FeatureConfig::default(),
            drift: DriftConfig::default(),
            horizons: vec![Horizon::MINUTES_15, Horizon::HOUR_1, Horizon::DAY_1],
            retention_days: 30,
            validation: ValidationPolicy::default(),
            database_url: None,
        }
    }
}

impl GridcastConfig {
    /// Load from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let vars: BTreeMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("GRIDCAST_") || k == "DATABASE_URL")
            .collect();
        Self::from_vars(&vars)
    }

    /// Load from an explicit variable set.
    pub fn from_vars(vars: &BTreeMap<String, String>) -> anyhow::Result<Self> {
        let mut config = match vars.get(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(path))?,
            None => Self::default(),
        };
        config.apply_overrides(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    fn apply_overrides(&mut self, vars: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(v) = vars.get("GRIDCAST_BIND_ADDR") {
            self.bind_addr = v.clone();
        }
        if let Some(v) = vars.get("GRIDCAST_LOG_FORMAT") {
            self.log_format = v.parse().context("GRIDCAST_LOG_FORMAT")?;
        }
        if let Some(v) = vars.get("GRIDCAST_DRIFT_WINDOW") {
            self.drift.window_size = v.trim().parse().context("GRIDCAST_DRIFT_WINDOW")?;
        }
        if let Some(v) = vars.get("GRIDCAST_DRIFT_CONSECUTIVE") {
            self.drift.consecutive_breaches = v.trim().parse().context("GRIDCAST_DRIFT_CONSECUTIVE")?;
        }
        if let Some(v) = vars.get("GRIDCAST_DRIFT_THRESHOLD_RATIO") {
            self.drift.threshold_ratio = v.trim().parse().context("GRIDCAST_DRIFT_THRESHOLD_RATIO")?;
        }
        if let Some(v) = vars.get("GRIDCAST_HORIZONS") {
            self.horizons = v
                .split(',')
                .map(|h| h.parse::<Horizon>())
                .collect::<Result<_, _>>()
                .context("GRIDCAST_HORIZONS")?;
        }
        if let Some(v) = vars.get("GRIDCAST_DATABASE_URL").or_else(|| vars.get("DATABASE_URL")) {
            self.database_url = Some(v.clone());
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.features.validate().context("feature pipeline config")?;
        self.drift.validate().context("drift config")?;

        if self.horizons.is_empty() {
            bail!("at least one horizon must be configured");
        }
        let resolution = self.features.resolution_minutes;
        for h in &self.horizons {
            h.steps(resolution).with_context(|| format!("horizon {h}"))?;
        }

        // Archived records stay readable, but the hot set should cover every lookback.
        let longest = self
            .horizons
            .iter()
            .map(|h| {
                i64::from(self.features.lookback_steps(*h)) * i64::from(resolution) + i64::from(h.minutes())
            })
            .max()
            .unwrap_or(0);
        if i64::from(self.retention_days) * 24 * 60 < longest {
            bail!(
                "retention of {} days is shorter than the longest feature lookback ({} minutes)",
                self.retention_days,
                longest
            );
        }
        Ok(())
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_are_valid() {
        let c = GridcastConfig::from_vars(&BTreeMap::new()).unwrap();
        assert_eq!(c, GridcastConfig::default());
        assert_eq!(c.drift.window_size, 96);
    }

    #[test]
    fn environment_overrides_apply() {
        let c = GridcastConfig::from_vars(&vars(&[
            ("GRIDCAST_BIND_ADDR", "127.0.0.1:9000"),
            ("GRIDCAST_LOG_FORMAT", "pretty"),
            ("GRIDCAST_DRIFT_WINDOW", "48"),
            ("GRIDCAST_DRIFT_CONSECUTIVE", "2"),
            ("GRIDCAST_DRIFT_THRESHOLD_RATIO", "1.25"),
            ("GRIDCAST_HORIZONS", "1h,24h"),
        ]))
        .unwrap();
        assert_eq!(c.bind_addr, "127.0.0.1:9000");
        assert_eq!(c.log_format, LogFormat::Pretty);
        assert_eq!(c.drift.window_size, 48);
        assert_eq!(c.drift.consecutive_breaches, 2);
        assert_eq!(c.drift.threshold_ratio, 1.25);
        assert_eq!(c.horizons, vec![Horizon::HOUR_1, Horizon::DAY_1]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(GridcastConfig::from_vars(&vars(&[("GRIDCAST_DRIFT_WINDOW", "0")])).is_err());
        assert!(GridcastConfig::from_vars(&vars(&[("GRIDCAST_DRIFT_WINDOW", "many")])).is_err());
        assert!(GridcastConfig::from_vars(&vars(&[("GRIDCAST_HORIZONS", "20m")])).is_err());
        assert!(GridcastConfig::from_vars(&vars(&[("GRIDCAST_LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn file_then_environment() {
        let path = std::env::temp_dir().join(format!("gridcast-config-{}.json", uuid::Uuid::now_v7()));
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{"bind_addr":"10.0.0.1:80","retention_days":7,"drift":{{"window_size":4}}}}"#).unwrap();
        drop(f);

        let c = GridcastConfig::from_vars(&vars(&[
            (CONFIG_PATH_VAR, path.to_str().unwrap()),
            ("GRIDCAST_BIND_ADDR", "10.0.0.2:80"),
        ]))
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(c.bind_addr, "10.0.0.2:80");
        assert_eq!(c.retention_days, 7);
        assert_eq!(c.drift.window_size, 4);
        assert_eq!(c.drift.consecutive_breaches, 3);
    }

    #[test]
    fn retention_must_cover_lookback() {
        let c = GridcastConfig {
            retention_days: 0,
            ..GridcastConfig::default()
        };
        assert!(c.validate().is_err());
    }
}
