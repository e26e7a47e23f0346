//! Fault injector
//!
//! Produces a perturbed, labeled copy of a clean held-out batch. The input
//! batch is never modified.

use crate::spec::{FaultKind, FaultSpec, NoiseDistribution};
use crate::InjectError;
use golden_features::{CanonicalRecord, Feature};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_SEED: u64 = 0x5EED_FA17;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledRecord {
    pub record: CanonicalRecord,
    /// Inside the fault window
    pub faulted: bool,
}

#[derive(Debug, Clone)]
pub struct FaultInjector {
    /// Features the satellite's adapter declares
    schema: Vec<Feature>,
    seed: u64,
}

impl FaultInjector {
    pub fn new(schema: &[Feature]) -> Self {
        Self {
            schema: schema.to_vec(),
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn inject(
        &self,
        batch: &[CanonicalRecord],
        spec: &FaultSpec,
    ) -> Result<Vec<LabeledRecord>, InjectError> {
        let feature = spec
            .feature
            .parse::<Feature>()
            .ok()
            .filter(|f| self.schema.contains(f))
            .ok_or_else(|| InjectError::UnknownFeature(spec.feature.clone()))?;

        let (first, last) = batch
            .iter()
            .map(|r| r.timestamp)
            .fold(None, |acc, t| match acc {
                None => Some((t, t)),
                Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            })
            .ok_or(InjectError::EmptyBatch)?;

        let window = spec.window;
        if window.end < window.start || window.end < first || window.start > last {
            return Err(InjectError::InvalidWindow {
                start: window.start,
                end: window.end,
                batch_start: first,
                batch_end: last,
            });
        }

        let magnitude = spec.magnitude;
        let negative_noise = matches!(spec.kind, FaultKind::Noise { .. }) && magnitude < 0.0;
        if !magnitude.is_finite() || negative_noise {
            return Err(InjectError::InvalidMagnitude(magnitude));
        }

        let mut out: Vec<LabeledRecord> = batch
            .iter()
            .map(|r| LabeledRecord {
                record: r.clone(),
                faulted: window.contains(r.timestamp),
            })
            .collect();

        match spec.kind {
            FaultKind::Drift => {
                for labeled in out.iter_mut().filter(|l| l.faulted) {
                    let record = &mut labeled.record;
                    let offset = magnitude * window.progress(record.timestamp);
                    if let Some(v) = record.value(feature) {
                        record.replace_value(feature, v + offset);
                    }
                }
            }
            FaultKind::Stuck => {
                let frozen = out
                    .iter()
                    .filter(|l| l.faulted)
                    .filter_map(|l| l.record.value(feature).map(|v| (l.record.timestamp, v)))
                    .min_by_key(|(t, _)| *t)
                    .map(|(_, v)| v)
                    .ok_or(InjectError::MissingBaseline(feature))?;

                for labeled in out.iter_mut().filter(|l| l.faulted) {
                    labeled.record.replace_value(feature, frozen);
                }
            }
            FaultKind::Noise { distribution } => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                let sampler = NoiseSampler::new(distribution, magnitude)?;
                for labeled in out.iter_mut().filter(|l| l.faulted) {
                    let record = &mut labeled.record;
                    if let Some(v) = record.value(feature) {
                        record.replace_value(feature, v + sampler.sample(&mut rng));
                    }
                }
            }
        }

        debug!(
            fault = %spec,
            faulted = out.iter().filter(|l| l.faulted).count(),
            total = out.len(),
            "fault injected"
        );
        Ok(out)
    }
}

enum NoiseSampler {
    Gaussian(Normal<f64>),
    Uniform(Uniform<f64>),
    Zero,
}

impl NoiseSampler {
    fn new(distribution: NoiseDistribution, magnitude: f64) -> Result<Self, InjectError> {
        if magnitude == 0.0 {
            return Ok(NoiseSampler::Zero);
        }
        Ok(match distribution {
            NoiseDistribution::Gaussian => NoiseSampler::Gaussian(
                Normal::new(0.0, magnitude).map_err(|_| InjectError::InvalidMagnitude(magnitude))?,
            ),
            NoiseDistribution::Uniform => {
                NoiseSampler::Uniform(Uniform::new_inclusive(-magnitude, magnitude))
            }
        })
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            NoiseSampler::Gaussian(d) => d.sample(rng),
            NoiseSampler::Uniform(d) => d.sample(rng),
            NoiseSampler::Zero => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FaultWindow;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use link_layer::Identity;

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(i * 10)
    }

    fn batch() -> Vec<CanonicalRecord> {
        let identity: Identity = "DP0UWE".parse().unwrap();
        (0..11)
            .map(|i| {
                CanonicalRecord::new(identity, 43880, t(i))
                    .with(Feature::BattVoltage, 4.0 + 0.01 * i as f64)
                    .with(Feature::TempObc, 20.0)
            })
            .collect()
    }

    fn schema() -> Vec<Feature> {
        vec![Feature::BattVoltage, Feature::BattCurrent, Feature::TempObc]
    }

    #[test]
    fn test_drift_ramps_across_window() {
        let spec = FaultSpec::drift("batt_voltage", 1.0, FaultWindow::new(t(2), t(6)));
        let out = FaultInjector::new(&schema()).inject(&batch(), &spec).unwrap();
        let clean = batch();

        let offsets: Vec<f64> = out
            .iter()
            .zip(&clean)
            .map(|(l, c)| l.record.value(Feature::BattVoltage).unwrap() - c.value(Feature::BattVoltage).unwrap())
            .collect();

        assert!(offsets[1].abs() < 1e-12);
        assert!(offsets[2].abs() < 1e-12);
        assert!((offsets[4] - 0.5).abs() < 1e-9);
        assert!((offsets[6] - 1.0).abs() < 1e-9);
        assert!(offsets[7].abs() < 1e-12);

        let labels: Vec<bool> = out.iter().map(|l| l.faulted).collect();
        assert_eq!(labels.iter().filter(|&&f| f).count(), 5);
        assert!(!labels[1] && labels[2] && labels[6] && !labels[7]);
    }

    #[test]
    fn test_zero_length_window_applies_full_drift() {
        let spec = FaultSpec::drift("batt_voltage", 2.0, FaultWindow::new(t(3), t(3)));
        let out = FaultInjector::new(&schema()).inject(&batch(), &spec).unwrap();

        assert!((out[3].record.value(Feature::BattVoltage).unwrap() - 6.03).abs() < 1e-9);
        assert_eq!(out.iter().filter(|l| l.faulted).count(), 1);
    }

    #[test]
    fn test_stuck_freezes_first_in_window_value() {
        let spec = FaultSpec::stuck("batt_voltage", FaultWindow::new(t(4), t(8)));
        let out = FaultInjector::new(&schema()).inject(&batch(), &spec).unwrap();

        for l in &out[4..=8] {
            assert_eq!(l.record.value(Feature::BattVoltage), Some(4.0 + 0.01 * 4.0));
        }
        assert_eq!(out[9].record.value(Feature::BattVoltage), Some(4.0 + 0.01 * 9.0));
    }

    #[test]
    fn test_noise_is_seeded() {
        let spec = FaultSpec::noise(
            "temp_obc",
            NoiseDistribution::Gaussian,
            0.5,
            FaultWindow::new(t(0), t(10)),
        );
        let injector = FaultInjector::new(&schema()).with_seed(7);
        let a = injector.inject(&batch(), &spec).unwrap();
        let b = injector.inject(&batch(), &spec).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().any(|l| l.record.value(Feature::TempObc) != Some(20.0)));

        let uniform = FaultSpec::noise(
            "temp_obc",
            NoiseDistribution::Uniform,
            0.5,
            FaultWindow::new(t(0), t(10)),
        );
        for l in injector.inject(&batch(), &uniform).unwrap() {
            let v = l.record.value(Feature::TempObc).unwrap();
            assert!((19.5..=20.5).contains(&v));
        }
    }

    #[test]
    fn test_input_batch_untouched() {
        let clean = batch();
        let spec = FaultSpec::drift("batt_voltage", 5.0, FaultWindow::new(t(0), t(10)));
        FaultInjector::new(&schema()).inject(&clean, &spec).unwrap();
        assert_eq!(clean, batch());
    }

    #[test]
    fn test_unknown_feature() {
        let window = FaultWindow::new(t(0), t(5));
        let injector = FaultInjector::new(&schema());

        let err = injector
            .inject(&batch(), &FaultSpec::drift("solar_power", 1.0, window))
            .unwrap_err();
        assert_eq!(err, InjectError::UnknownFeature("solar_power".to_string()));

        let err = injector
            .inject(&batch(), &FaultSpec::drift("flux_capacitor", 1.0, window))
            .unwrap_err();
        assert_eq!(err, InjectError::UnknownFeature("flux_capacitor".to_string()));
    }

    #[test]
    fn test_invalid_window() {
        let injector = FaultInjector::new(&schema());

        let inverted = FaultSpec::drift("batt_voltage", 1.0, FaultWindow::new(t(5), t(2)));
        assert!(matches!(
            injector.inject(&batch(), &inverted),
            Err(InjectError::InvalidWindow { .. })
        ));

        let outside = FaultSpec::drift("batt_voltage", 1.0, FaultWindow::new(t(20), t(30)));
        assert!(matches!(
            injector.inject(&batch(), &outside),
            Err(InjectError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_other_validation() {
        let injector = FaultInjector::new(&schema());
        let window = FaultWindow::new(t(0), t(5));

        assert_eq!(
            injector.inject(&[], &FaultSpec::drift("batt_voltage", 1.0, window)),
            Err(InjectError::EmptyBatch)
        );
        assert_eq!(
            injector.inject(
                &batch(),
                &FaultSpec::noise("temp_obc", NoiseDistribution::Gaussian, -1.0, window)
            ),
            Err(InjectError::InvalidMagnitude(-1.0))
        );
        assert!(matches!(
            injector.inject(&batch(), &FaultSpec::drift("batt_voltage", f64::NAN, window)),
            Err(InjectError::InvalidMagnitude(_))
        ));
        assert_eq!(
            injector.inject(&batch(), &FaultSpec::stuck("batt_current", window)),
            Err(InjectError::MissingBaseline(Feature::BattCurrent))
        );
    }
}
