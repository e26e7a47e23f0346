//! Fault specifications
//!
//! ```json
//! {"kind": "drift", "feature": "batt_voltage", "magnitude": -0.5,
//!  "window": {"start": "2024-03-01T00:00:00Z", "end": "2024-03-02T00:00:00Z"}}
//! {"kind": "noise", "distribution": "gaussian", "feature": "temp_obc", ...}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseDistribution {
    /// Magnitude is the standard deviation
    Gaussian,
    /// Magnitude is the half-width
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultKind {
    /// Offset ramping linearly from zero to `magnitude` across the window
    Drift,
    /// Value frozen at the first in-window reading
    Stuck,
    Noise { distribution: NoiseDistribution },
}

/// Inclusive timestamp interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FaultWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    /// Position of `t` in the window, 0.0 at start and 1.0 at end. A
    /// zero-length window is entirely "end".
    pub fn progress(&self, t: DateTime<Utc>) -> f64 {
        let span = (self.end - self.start).num_milliseconds();
        if span <= 0 {
            return 1.0;
        }
        ((t - self.start).num_milliseconds() as f64 / span as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSpec {
    #[serde(flatten)]
    pub kind: FaultKind,
    /// Canonical feature name
    pub feature: String,
    pub magnitude: f64,
    pub window: FaultWindow,
}

impl FaultSpec {
    pub fn drift(feature: &str, magnitude: f64, window: FaultWindow) -> Self {
        Self {
            kind: FaultKind::Drift,
            feature: feature.to_string(),
            magnitude,
            window,
        }
    }

    pub fn stuck(feature: &str, window: FaultWindow) -> Self {
        Self {
            kind: FaultKind::Stuck,
            feature: feature.to_string(),
            magnitude: 0.0,
            window,
        }
    }

    pub fn noise(
        feature: &str,
        distribution: NoiseDistribution,
        magnitude: f64,
        window: FaultWindow,
    ) -> Self {
        Self {
            kind: FaultKind::Noise { distribution },
            feature: feature.to_string(),
            magnitude,
            window,
        }
    }
}

impl fmt::Display for FaultSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::Drift => write!(f, "drift {} by {}", self.feature, self.magnitude),
            FaultKind::Stuck => write!(f, "stuck {}", self.feature),
            FaultKind::Noise { distribution } => write!(
                f,
                "{:?} noise on {} ({})",
                distribution, self.feature, self.magnitude
            ),
        }
    }
}
