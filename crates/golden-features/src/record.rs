//! Canonical record ("Golden Feature" vector)

use crate::schema::{Feature, FEATURE_COUNT};
use chrono::{DateTime, Utc};
use link_layer::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A present feature value in its declared unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    /// Outside the sanity range; kept, but marked
    #[serde(default)]
    pub suspect: bool,
}

impl Reading {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            suspect: false,
        }
    }
}

/// Spacecraft operating mode as reported in the beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    Startup,
    Nominal,
    Safe,
    Transmit,
    Unknown,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Startup => "startup",
            OperatingMode::Nominal => "nominal",
            OperatingMode::Safe => "safe",
            OperatingMode::Transmit => "transmit",
            OperatingMode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "startup" => Ok(OperatingMode::Startup),
            "nominal" => Ok(OperatingMode::Nominal),
            "safe" => Ok(OperatingMode::Safe),
            "transmit" => Ok(OperatingMode::Transmit),
            "unknown" => Ok(OperatingMode::Unknown),
            other => Err(format!("unknown operating mode {:?}", other)),
        }
    }
}

/// One decoded observation of one satellite.
///
/// Readings are indexed by [`Feature::index`]. A feature the satellite does
/// not report is `None`; it is never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub identity: Identity,
    pub norad_id: u32,
    pub timestamp: DateTime<Utc>,
    pub mode: Option<OperatingMode>,
    readings: [Option<Reading>; FEATURE_COUNT],
}

impl CanonicalRecord {
    /// An empty record; every feature missing
    pub fn new(identity: Identity, norad_id: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity,
            norad_id,
            timestamp,
            mode: None,
            readings: [None; FEATURE_COUNT],
        }
    }

    pub fn get(&self, feature: Feature) -> Option<Reading> {
        self.readings[feature.index()]
    }

    pub fn value(&self, feature: Feature) -> Option<f64> {
        self.get(feature).map(|r| r.value)
    }

    pub fn set(&mut self, feature: Feature, reading: Reading) {
        self.readings[feature.index()] = Some(reading);
    }

    /// Overwrite a present value, keeping its suspect flag. Returns false if
    /// the feature is missing.
    pub fn replace_value(&mut self, feature: Feature, value: f64) -> bool {
        match self.readings[feature.index()].as_mut() {
            Some(reading) => {
                reading.value = value;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, feature: Feature) {
        self.readings[feature.index()] = None;
    }

    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, Reading::new(value));
        self
    }

    pub fn present_features(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL
            .into_iter()
            .filter(move |f| self.readings[f.index()].is_some())
    }

    pub fn suspect_features(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL
            .into_iter()
            .filter(move |f| self.readings[f.index()].is_some_and(|r| r.suspect))
    }
}
