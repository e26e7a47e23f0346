//! Golden Feature schema
//!
//! The authoritative list of canonical features, in vector order. Adding,
//! removing or reordering a feature requires bumping [`SCHEMA_VERSION`]:
//! stored model artifacts carry [`schema_hash`] and are refused on mismatch.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current schema version
pub const SCHEMA_VERSION: u8 = 1;

/// Number of canonical features
pub const FEATURE_COUNT: usize = 10;

/// Physical units the schema declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Volt,
    Ampere,
    Watt,
    Celsius,
    Dbm,
    RadianPerSecond,
    Second,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Watt => "W",
            Unit::Celsius => "°C",
            Unit::Dbm => "dBm",
            Unit::RadianPerSecond => "rad/s",
            Unit::Second => "s",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Canonical feature, in schema order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BattVoltage,
    /// Positive while charging
    BattCurrent,
    SolarPower,
    TempObc,
    TempPa,
    TempBatt,
    TempPanel,
    SignalRssi,
    TumbleRate,
    Uptime,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::BattVoltage,
        Feature::BattCurrent,
        Feature::SolarPower,
        Feature::TempObc,
        Feature::TempPa,
        Feature::TempBatt,
        Feature::TempPanel,
        Feature::SignalRssi,
        Feature::TumbleRate,
        Feature::Uptime,
    ];

    /// Position in the feature vector
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::BattVoltage => "batt_voltage",
            Feature::BattCurrent => "batt_current",
            Feature::SolarPower => "solar_power",
            Feature::TempObc => "temp_obc",
            Feature::TempPa => "temp_pa",
            Feature::TempBatt => "temp_batt",
            Feature::TempPanel => "temp_panel",
            Feature::SignalRssi => "signal_rssi",
            Feature::TumbleRate => "tumble_rate",
            Feature::Uptime => "uptime",
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            Feature::BattVoltage => Unit::Volt,
            Feature::BattCurrent => Unit::Ampere,
            Feature::SolarPower => Unit::Watt,
            Feature::TempObc | Feature::TempPa | Feature::TempBatt | Feature::TempPanel => {
                Unit::Celsius
            }
            Feature::SignalRssi => Unit::Dbm,
            Feature::TumbleRate => Unit::RadianPerSecond,
            Feature::Uptime => Unit::Second,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature {0:?}")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

/// CRC32 over the schema version and the feature names in order
pub fn schema_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[SCHEMA_VERSION]);
    for feature in Feature::ALL {
        hasher.update(feature.name().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_order_matches_index() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
    }

    #[test]
    fn test_name_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>(), Ok(feature));
        }
        assert!("battery".parse::<Feature>().is_err());
    }

    #[test]
    fn test_serde_uses_schema_names() {
        let json = serde_json::to_string(&Feature::TempObc).unwrap();
        assert_eq!(json, "\"temp_obc\"");
    }

    #[test]
    fn test_schema_hash_stable() {
        assert_eq!(schema_hash(), schema_hash());
        assert_ne!(schema_hash(), 0);
    }
}
