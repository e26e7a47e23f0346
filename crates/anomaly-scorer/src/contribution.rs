//! Contribution Analyzer
//!
//! Turns a raw score into an operator-facing report: which features deviate,
//! by how much relative to their training error, most deviant first.

use crate::artifact::{ModelArtifact, Score};
use chrono::{DateTime, SecondsFormat, Utc};
use golden_features::{CanonicalRecord, Feature};
use link_layer::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default multiple of the training error a feature must exceed
pub const DEFAULT_CONTRIBUTION_MULTIPLE: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: Feature,
    /// Absolute error, original units
    pub error: f64,
    /// `error` divided by the feature's training error scale
    pub normalized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Derived from identity, timestamp and score, so a frame delivered
    /// twice yields the same id
    pub id: Uuid,
    pub identity: Identity,
    pub norad_id: u32,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub threshold: f64,
    pub above_threshold: bool,
    /// No feature exceeded its contribution multiple
    pub nominal: bool,
    pub errors: BTreeMap<Feature, f64>,
    /// Ranked, most deviant first
    pub contributors: Vec<Contribution>,
    /// Model features that were out of sanity range in the input
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suspect: Vec<Feature>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionAnalyzer {
    multiple: f64,
}

impl Default for ContributionAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_CONTRIBUTION_MULTIPLE)
    }
}

impl ContributionAnalyzer {
    pub fn new(multiple: f64) -> Self {
        Self { multiple }
    }

    pub fn multiple(&self) -> f64 {
        self.multiple
    }

    /// Rank features by normalized error, descending. Ties keep schema order.
    pub fn rank(&self, artifact: &ModelArtifact, score: &Score) -> Vec<Contribution> {
        let mut ranked: Vec<Contribution> = score
            .errors
            .iter()
            .zip(&artifact.baseline.error_scale)
            .map(|(&(feature, error), &scale)| Contribution {
                feature,
                error,
                normalized: error / scale,
            })
            .collect();

        // Stable sort; errors arrive in schema order
        ranked.sort_by(|a, b| b.normalized.total_cmp(&a.normalized));
        ranked
    }

    pub fn analyze(
        &self,
        artifact: &ModelArtifact,
        record: &CanonicalRecord,
        score: &Score,
    ) -> AnomalyReport {
        let contributors: Vec<Contribution> = self
            .rank(artifact, score)
            .into_iter()
            .filter(|c| c.normalized > self.multiple)
            .collect();

        let suspect = record
            .suspect_features()
            .filter(|f| artifact.features.contains(f))
            .collect();

        AnomalyReport {
            id: report_id(record, score.aggregate),
            identity: record.identity,
            norad_id: record.norad_id,
            timestamp: record.timestamp,
            score: score.aggregate,
            threshold: artifact.baseline.threshold,
            above_threshold: score.aggregate > artifact.baseline.threshold,
            nominal: contributors.is_empty(),
            errors: score.errors.iter().copied().collect(),
            contributors,
            suspect,
        }
    }
}

fn report_id(record: &CanonicalRecord, score: f64) -> Uuid {
    let name = format!(
        "{}/{}/{:016x}",
        record.identity,
        record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
        score.to_bits()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::TrainingBaseline;
    use crate::model::ReconstructionModel;
    use crate::scaler::FeatureScaler;
    use golden_features::{schema_hash, SCHEMA_VERSION};

    fn artifact(error_scale: Vec<f64>) -> ModelArtifact {
        let features = vec![Feature::BattVoltage, Feature::BattCurrent, Feature::TempObc];
        let n = features.len();
        ModelArtifact {
            identity: "LU7AQB".parse().unwrap(),
            norad_id: 40014,
            schema_version: SCHEMA_VERSION,
            schema_hash: schema_hash(),
            trained_at: Utc::now(),
            training_records: 100,
            features,
            scaler: FeatureScaler {
                mean: vec![0.0; n],
                scale: vec![1.0; n],
            },
            model: ReconstructionModel {
                weights: vec![0.0; n * n],
                n,
            },
            baseline: TrainingBaseline {
                error_scale,
                score_min: 0.0,
                score_mean: 0.5,
                threshold_quantile: 0.99,
                threshold: 2.0,
            },
        }
    }

    fn score(errors: [f64; 3]) -> Score {
        Score {
            aggregate: errors.iter().map(|e| e * e).sum::<f64>() / 3.0,
            errors: vec![
                (Feature::BattVoltage, errors[0]),
                (Feature::BattCurrent, errors[1]),
                (Feature::TempObc, errors[2]),
            ],
        }
    }

    fn record(artifact: &ModelArtifact) -> CanonicalRecord {
        CanonicalRecord::new(artifact.identity, artifact.norad_id, Utc::now())
    }

    #[test]
    fn test_ranks_by_normalized_error() {
        let artifact = artifact(vec![0.1, 0.01, 1.0]);
        let ranked = ContributionAnalyzer::default().rank(&artifact, &score([0.2, 0.05, 4.0]));

        let order: Vec<Feature> = ranked.iter().map(|c| c.feature).collect();
        assert_eq!(order, vec![Feature::BattCurrent, Feature::TempObc, Feature::BattVoltage]);
        assert!((ranked[0].normalized - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_schema_order() {
        let artifact = artifact(vec![1.0, 1.0, 1.0]);
        let ranked = ContributionAnalyzer::default().rank(&artifact, &score([5.0, 5.0, 5.0]));

        let order: Vec<Feature> = ranked.iter().map(|c| c.feature).collect();
        assert_eq!(order, vec![Feature::BattVoltage, Feature::BattCurrent, Feature::TempObc]);
    }

    #[test]
    fn test_nominal_even_when_score_elevated() {
        let artifact = artifact(vec![1.0, 1.0, 1.0]);
        let s = score([2.9, 2.9, 2.9]);
        let report = ContributionAnalyzer::default().analyze(&artifact, &record(&artifact), &s);

        assert!(report.above_threshold);
        assert!(report.nominal);
        assert!(report.contributors.is_empty());
        assert_eq!(report.errors.len(), 3);
    }

    #[test]
    fn test_only_exceeding_features_reported() {
        let artifact = artifact(vec![1.0, 1.0, 0.5]);
        let s = score([0.1, 3.5, 20.0]);
        let report = ContributionAnalyzer::new(3.0).analyze(&artifact, &record(&artifact), &s);

        assert!(!report.nominal);
        let order: Vec<Feature> = report.contributors.iter().map(|c| c.feature).collect();
        assert_eq!(order, vec![Feature::TempObc, Feature::BattCurrent]);
    }

    #[test]
    fn test_repeated_delivery_gives_identical_report() {
        let artifact = artifact(vec![1.0, 1.0, 0.5]);
        let record = record(&artifact);
        let s = score([0.1, 3.5, 20.0]);
        let analyzer = ContributionAnalyzer::default();

        let first = analyzer.analyze(&artifact, &record, &s);
        assert_eq!(analyzer.analyze(&artifact, &record, &s), first);

        let at = record.timestamp + chrono::Duration::seconds(1);
        let later = CanonicalRecord::new(record.identity, record.norad_id, at);
        assert_ne!(analyzer.analyze(&artifact, &later, &s).id, first.id);
    }

    #[test]
    fn test_report_serializes_feature_names() {
        let artifact = artifact(vec![1.0, 1.0, 1.0]);
        let report =
            ContributionAnalyzer::default().analyze(&artifact, &record(&artifact), &score([0.0, 0.0, 9.0]));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["identity"], "LU7AQB");
        assert_eq!(json["contributors"][0]["feature"], "temp_obc");
        assert!(json["errors"]["batt_voltage"].is_number());
        assert!(json.get("suspect").is_none());
    }
}
