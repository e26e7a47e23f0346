//! Offline detector benchmark
//!
//! Scores a labeled batch and counts detections against one or more score
//! thresholds. A record is detected when its aggregate score exceeds the
//! threshold.

use crate::injector::LabeledRecord;
use anomaly_scorer::{ModelArtifact, ScoreError};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub threshold: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    /// `None` when the batch has no faulted records
    pub recall: Option<f64>,
    /// `None` when the batch has no clean records
    pub false_positive_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub fault: String,
    pub scored: usize,
    pub skipped_incomplete: usize,
    pub results: Vec<ThresholdResult>,
}

impl BenchmarkReport {
    /// Result at the artifact's default threshold, if it was evaluated
    pub fn at(&self, threshold: f64) -> Option<&ThresholdResult> {
        self.results.iter().find(|r| r.threshold == threshold)
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// Score `labeled` with `artifact` and tabulate detection at each threshold.
/// An empty `thresholds` uses the artifact's default threshold.
pub fn evaluate(
    artifact: &ModelArtifact,
    fault: &str,
    labeled: &[LabeledRecord],
    thresholds: &[f64],
) -> Result<BenchmarkReport, ScoreError> {
    let mut scored: Vec<(f64, bool)> = Vec::with_capacity(labeled.len());
    let mut skipped_incomplete = 0;

    for item in labeled {
        match artifact.score(&item.record) {
            Ok(score) => scored.push((score.aggregate, item.faulted)),
            Err(ScoreError::IncompleteRecord { .. }) => skipped_incomplete += 1,
            Err(e) => return Err(e),
        }
    }

    let thresholds: Vec<f64> = if thresholds.is_empty() {
        vec![artifact.baseline.threshold]
    } else {
        thresholds.to_vec()
    };

    let results = thresholds
        .into_iter()
        .map(|threshold| {
            let (mut tp, mut fp, mut tn, mut fn_) = (0, 0, 0, 0);
            for &(score, faulted) in &scored {
                match (score > threshold, faulted) {
                    (true, true) => tp += 1,
                    (true, false) => fp += 1,
                    (false, false) => tn += 1,
                    (false, true) => fn_ += 1,
                }
            }
            ThresholdResult {
                threshold,
                true_positives: tp,
                false_positives: fp,
                true_negatives: tn,
                false_negatives: fn_,
                recall: ratio(tp, tp + fn_),
                false_positive_rate: ratio(fp, fp + tn),
            }
        })
        .collect::<Vec<_>>();

    for r in &results {
        info!(
            identity = %artifact.identity,
            fault,
            threshold = r.threshold,
            recall = ?r.recall,
            fpr = ?r.false_positive_rate,
            "benchmark"
        );
    }

    Ok(BenchmarkReport {
        fault: fault.to_string(),
        scored: scored.len(),
        skipped_incomplete,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::FaultInjector;
    use crate::spec::{FaultSpec, FaultWindow};
    use anomaly_scorer::{train, TrainerConfig};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use golden_features::{CanonicalRecord, Feature};
    use link_layer::Identity;

    fn identity() -> Identity {
        "LU7AQB".parse().unwrap()
    }

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::seconds(i * 30)
    }

    fn features() -> [Feature; 2] {
        [Feature::BattVoltage, Feature::BattCurrent]
    }

    fn artifact() -> ModelArtifact {
        let mut records = Vec::new();
        for k in 0..11 {
            let current = 0.1 + 0.01 * k as f64;
            for jitter in [-0.02, 0.0, 0.02] {
                records.push(
                    CanonicalRecord::new(identity(), 40014, t(records.len() as i64))
                        .with(Feature::BattVoltage, 8.0 + 4.0 * (current - 0.1) + jitter)
                        .with(Feature::BattCurrent, current),
                );
            }
        }
        train(identity(), &features(), &records, &TrainerConfig::default()).unwrap()
    }

    fn held_out(n: i64) -> Vec<CanonicalRecord> {
        (0..n)
            .map(|k| {
                let current = 0.1 + 0.01 * (k % 11) as f64;
                CanonicalRecord::new(identity(), 40014, t(k))
                    .with(Feature::BattVoltage, 8.0 + 4.0 * (current - 0.1))
                    .with(Feature::BattCurrent, current)
            })
            .collect()
    }

    #[test]
    fn test_clean_batch_has_no_detections() {
        let artifact = artifact();
        let labeled: Vec<LabeledRecord> = held_out(20)
            .into_iter()
            .map(|record| LabeledRecord {
                record,
                faulted: false,
            })
            .collect();

        let report = evaluate(&artifact, "none", &labeled, &[]).unwrap();
        let r = &report.results[0];
        assert_eq!(r.threshold, artifact.baseline.threshold);
        assert_eq!(r.false_positives, 0);
        assert_eq!(r.false_positive_rate, Some(0.0));
        assert_eq!(r.recall, None);
    }

    #[test]
    fn test_drift_detected_and_counts_add_up() {
        let artifact = artifact();
        let batch = held_out(40);
        let spec = FaultSpec::drift("batt_voltage", 1.0, FaultWindow::new(t(20), t(39)));
        let labeled = FaultInjector::new(&features()).inject(&batch, &spec).unwrap();

        let report = evaluate(&artifact, &spec.to_string(), &labeled, &[artifact.baseline.threshold, 1e9]).unwrap();
        assert_eq!(report.scored, 40);
        assert_eq!(report.results.len(), 2);

        let default = report.at(artifact.baseline.threshold).unwrap();
        assert_eq!(
            default.true_positives + default.false_negatives + default.false_positives + default.true_negatives,
            40
        );
        assert!(default.recall.unwrap() >= 0.8);
        assert_eq!(default.false_positives, 0);

        let lenient = report.at(1e9).unwrap();
        assert_eq!(lenient.true_positives, 0);
        assert_eq!(lenient.recall, Some(0.0));
    }

    #[test]
    fn test_incomplete_records_skipped() {
        let artifact = artifact();
        let mut batch = held_out(5);
        batch[2].clear(Feature::BattCurrent);
        let labeled: Vec<LabeledRecord> = batch
            .into_iter()
            .map(|record| LabeledRecord {
                record,
                faulted: true,
            })
            .collect();

        let report = evaluate(&artifact, "none", &labeled, &[]).unwrap();
        assert_eq!(report.skipped_incomplete, 1);
        assert_eq!(report.scored, 4);
    }
}
