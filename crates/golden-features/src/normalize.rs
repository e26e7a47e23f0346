//! Unit Normalizer
//!
//! Adapters hand over physical quantities tagged with a unit. The normalizer
//! checks each one against the feature's declared unit and the sanity range
//! table, and assembles the canonical record. Out-of-range values survive
//! with `suspect = true`.

use crate::record::{CanonicalRecord, OperatingMode, Reading};
use crate::schema::{Feature, Unit};
use chrono::{DateTime, Utc};
use link_layer::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("{feature} expects {expected}, adapter supplied {found}")]
    UnitMismatch {
        feature: Feature,
        expected: Unit,
        found: Unit,
    },
    #[error("{feature} is not finite: {value}")]
    NonFinite { feature: Feature, value: f64 },
    #[error("{0} supplied twice")]
    DuplicateField(Feature),
}

/// A value with its unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn volts(value: f64) -> Self {
        Self::new(value, Unit::Volt)
    }

    pub fn amps(value: f64) -> Self {
        Self::new(value, Unit::Ampere)
    }

    pub fn watts(value: f64) -> Self {
        Self::new(value, Unit::Watt)
    }

    pub fn celsius(value: f64) -> Self {
        Self::new(value, Unit::Celsius)
    }

    pub fn dbm(value: f64) -> Self {
        Self::new(value, Unit::Dbm)
    }

    pub fn radians_per_second(value: f64) -> Self {
        Self::new(value, Unit::RadianPerSecond)
    }

    pub fn seconds(value: f64) -> Self {
        Self::new(value, Unit::Second)
    }
}

/// Adapter output: the fields one satellite populated, nothing else
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalFields {
    fields: Vec<(Feature, Quantity)>,
    mode: Option<OperatingMode>,
}

impl PhysicalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: Feature, quantity: Quantity) {
        self.fields.push((feature, quantity));
    }

    pub fn with(mut self, feature: Feature, quantity: Quantity) -> Self {
        self.push(feature, quantity);
        self
    }

    /// Add the field only when the raw format sampled it
    pub fn with_opt(mut self, feature: Feature, quantity: Option<Quantity>) -> Self {
        if let Some(q) = quantity {
            self.push(feature, q);
        }
        self
    }

    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn mode(&self) -> Option<OperatingMode> {
        self.mode
    }

    pub fn get(&self, feature: Feature) -> Option<Quantity> {
        self.fields
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, q)| *q)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Feature, Quantity)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Inclusive sanity bounds in the feature's declared unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SanityRange {
    pub min: f64,
    pub max: f64,
}

impl SanityRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Bounds are ordered and neither is NaN
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

/// Per-feature sanity ranges. Features without an entry are not range checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeTable(BTreeMap<Feature, SanityRange>);

impl RangeTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, feature: Feature) -> Option<SanityRange> {
        self.0.get(&feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, SanityRange)> + '_ {
        self.0.iter().map(|(f, r)| (*f, *r))
    }

    pub fn set(&mut self, feature: Feature, range: SanityRange) {
        self.0.insert(feature, range);
    }

    /// Entries of `overrides` replace the ones in `self`
    pub fn merged(mut self, overrides: &RangeTable) -> Self {
        for (feature, range) in &overrides.0 {
            self.0.insert(*feature, *range);
        }
        self
    }
}

impl Default for RangeTable {
    fn default() -> Self {
        let table = [
            (Feature::BattVoltage, SanityRange::new(0.0, 20.0)),
            (Feature::BattCurrent, SanityRange::new(-5.0, 5.0)),
            (Feature::SolarPower, SanityRange::new(0.0, 50.0)),
            (Feature::TempObc, SanityRange::new(-40.0, 85.0)),
            (Feature::TempPa, SanityRange::new(-40.0, 125.0)),
            (Feature::TempBatt, SanityRange::new(-20.0, 60.0)),
            (Feature::TempPanel, SanityRange::new(-120.0, 150.0)),
            (Feature::SignalRssi, SanityRange::new(-160.0, 0.0)),
            (Feature::TumbleRate, SanityRange::new(-10.0, 10.0)),
            // Ten years
            (Feature::Uptime, SanityRange::new(0.0, 315_360_000.0)),
        ];
        Self(table.into_iter().collect())
    }
}

/// Builds canonical records from adapter output
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    ranges: RangeTable,
}

impl Normalizer {
    pub fn new(ranges: RangeTable) -> Self {
        Self { ranges }
    }

    pub fn ranges(&self) -> &RangeTable {
        &self.ranges
    }

    pub fn normalize(
        &self,
        identity: Identity,
        norad_id: u32,
        timestamp: DateTime<Utc>,
        fields: &PhysicalFields,
    ) -> Result<CanonicalRecord, NormalizeError> {
        let mut record = CanonicalRecord::new(identity, norad_id, timestamp);
        record.mode = fields.mode();

        for &(feature, quantity) in fields.iter() {
            if quantity.unit != feature.unit() {
                return Err(NormalizeError::UnitMismatch {
                    feature,
                    expected: feature.unit(),
                    found: quantity.unit,
                });
            }
            if !quantity.value.is_finite() {
                return Err(NormalizeError::NonFinite {
                    feature,
                    value: quantity.value,
                });
            }
            if record.get(feature).is_some() {
                return Err(NormalizeError::DuplicateField(feature));
            }

            let suspect = self
                .ranges
                .get(feature)
                .is_some_and(|range| !range.contains(quantity.value));
            if suspect {
                debug!(%identity, %feature, value = quantity.value, "reading outside sanity range");
            }

            record.set(
                feature,
                Reading {
                    value: quantity.value,
                    suspect,
                },
            );
        }

        Ok(record)
    }
}
