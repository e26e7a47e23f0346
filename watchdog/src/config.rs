//! Watchdog configuration
//!
//! Loaded from a JSON file when `--config` is given. Every field is optional;
//! range entries are merged over the built-in table.
//!
//! ```json
//! {
//!   "ranges": {"temp_obc": {"min": -30.0, "max": 70.0}},
//!   "contribution_multiple": 4.0,
//!   "trainer": {"threshold_quantile": 0.995},
//!   "calibration": {"bugsat1": {"battery_voltage": {"gain": 0.0101}}},
//!   "status_port": 18700
//! }
//! ```

use anomaly_scorer::{TrainerConfig, DEFAULT_CONTRIBUTION_MULTIPLE};
use golden_features::{Feature, RangeTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use telemetry_decoders::CalibrationSet;
use thiserror::Error;

pub const STATUS_PORT_ENV: &str = "WATCHDOG_STATUS_PORT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("contribution multiple must be positive, got {0}")]
    InvalidMultiple(f64),
    #[error("threshold quantile must be in (0, 1], got {0}")]
    InvalidQuantile(f64),
    #[error("sanity range for {0} has min above max")]
    InvalidRange(Feature),
    #[error("WATCHDOG_STATUS_PORT={0} is not a port number")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Overrides for the built-in sanity ranges
    pub ranges: RangeTable,
    pub contribution_multiple: f64,
    pub trainer: TrainerConfig,
    pub calibration: CalibrationSet,
    pub status_port: Option<u16>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            ranges: RangeTable::default(),
            contribution_multiple: DEFAULT_CONTRIBUTION_MULTIPLE,
            trainer: TrainerConfig::default(),
            calibration: CalibrationSet::default(),
            status_port: None,
        }
    }
}

impl WatchdogConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut config: WatchdogConfig = serde_json::from_str(text)?;
        config.ranges = RangeTable::default().merged(&config.ranges);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = self.contribution_multiple;
        if m.is_nan() || m <= 0.0 {
            return Err(ConfigError::InvalidMultiple(self.contribution_multiple));
        }
        let q = self.trainer.threshold_quantile;
        if q.is_nan() || q <= 0.0 || q > 1.0 {
            return Err(ConfigError::InvalidQuantile(q));
        }
        if let Some((feature, _)) = self.ranges.iter().find(|(_, r)| !r.is_valid()) {
            return Err(ConfigError::InvalidRange(feature));
        }
        Ok(())
    }

    /// Apply environment overrides
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = std::env::var(STATUS_PORT_ENV) {
            self.status_port = Some(parse_port(&raw)?);
        }
        Ok(self)
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use golden_features::SanityRange;

    #[test]
    fn test_empty_config_is_default() {
        let config = WatchdogConfig::from_json("{}").unwrap();
        assert_eq!(config, WatchdogConfig::default());
        assert_eq!(config.contribution_multiple, 3.0);
        assert_eq!(config.trainer.min_records, 16);
    }

    #[test]
    fn test_ranges_merge_over_defaults() {
        let config = WatchdogConfig::from_json(
            r#"{"ranges": {"temp_obc": {"min": -30.0, "max": 70.0}}, "status_port": 18700}"#,
        )
        .unwrap();

        assert_eq!(
            config.ranges.get(Feature::TempObc),
            Some(SanityRange::new(-30.0, 70.0))
        );
        assert_eq!(
            config.ranges.get(Feature::BattVoltage),
            Some(SanityRange::new(0.0, 20.0))
        );
        assert_eq!(config.status_port, Some(18700));
    }

    #[test]
    fn test_partial_trainer_section() {
        let config =
            WatchdogConfig::from_json(r#"{"trainer": {"threshold_quantile": 0.995}}"#).unwrap();
        assert_eq!(config.trainer.threshold_quantile, 0.995);
        assert_eq!(config.trainer.ridge_lambda, 1e-3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            WatchdogConfig::from_json(r#"{"contribution_multiple": 0.0}"#),
            Err(ConfigError::InvalidMultiple(_))
        ));
        assert!(matches!(
            WatchdogConfig::from_json(r#"{"trainer": {"threshold_quantile": 1.5}}"#),
            Err(ConfigError::InvalidQuantile(_))
        ));
        assert!(matches!(
            WatchdogConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            WatchdogConfig::from_json(r#"{"ranges": {"temp_pa": {"min": 90.0, "max": -40.0}}}"#),
            Err(ConfigError::InvalidRange(Feature::TempPa))
        ));

        let mut config = WatchdogConfig::default();
        config.ranges.set(Feature::BattVoltage, SanityRange::new(f64::NAN, 20.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange(Feature::BattVoltage))
        ));
    }

    #[test]
    fn test_port_parsing() {
        assert_eq!(parse_port(" 18700 ").unwrap(), 18700);
        assert!(matches!(parse_port("http"), Err(ConfigError::InvalidPort(_))));
        assert!(matches!(parse_port("70000"), Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.json");
        std::fs::write(&path, r#"{"contribution_multiple": 4.5}"#).unwrap();

        let config = WatchdogConfig::load(&path).unwrap();
        assert_eq!(config.contribution_multiple, 4.5);
    }
}
