//! Per-satellite calibration
//!
//! Every conversion from raw counts is an affine `gain * raw + offset`.
//! Defaults reproduce the published format scalings; deployments may
//! override any channel through configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub gain: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Affine {
    pub const fn new(gain: f64, offset: f64) -> Self {
        Self { gain, offset }
    }

    pub const fn scale(gain: f64) -> Self {
        Self { gain, offset: 0.0 }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        self.gain * raw + self.offset
    }
}

/// GO-32 ADC channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Go32Calibration {
    /// ADC counts to volts
    pub battery_voltage: Affine,
    /// ADC counts to amps
    pub battery_current: Affine,
    /// ADC counts to solar array amps
    pub solar_current: Affine,
    /// Counts to °C
    pub temperature: Affine,
}

impl Default for Go32Calibration {
    fn default() -> Self {
        Self {
            battery_voltage: Affine::scale(15.0 / 1024.0),
            battery_current: Affine::scale(2.0 / 1024.0),
            solar_current: Affine::scale(5.0 / 1024.0),
            temperature: Affine::scale(0.1),
        }
    }
}

/// UWE-4 housekeeping channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Uwe4Calibration {
    /// mV to V
    pub battery_voltage: Affine,
    /// mA to A
    pub battery_current: Affine,
    pub temperature: Affine,
}

impl Default for Uwe4Calibration {
    fn default() -> Self {
        Self {
            battery_voltage: Affine::scale(1e-3),
            battery_current: Affine::scale(1e-3),
            temperature: Affine::scale(1.0),
        }
    }
}

/// BugSat-1 beacon channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugSat1Calibration {
    /// 10 mV counts to V
    pub battery_voltage: Affine,
    /// 10 mA counts to A
    pub battery_current: Affine,
    /// 0.1 °C counts to °C
    pub temperature: Affine,
}

impl Default for BugSat1Calibration {
    fn default() -> Self {
        Self {
            battery_voltage: Affine::scale(0.01),
            battery_current: Affine::scale(0.01),
            temperature: Affine::scale(0.1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSet {
    pub go32: Go32Calibration,
    pub uwe4: Uwe4Calibration,
    pub bugsat1: BugSat1Calibration,
}
