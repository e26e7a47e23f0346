//! Per-satellite model artifact and serving-time scoring

use crate::model::ReconstructionModel;
use crate::scaler::FeatureScaler;
use crate::store::StoreError;
use crate::ScoreError;
use chrono::{DateTime, Utc};
use golden_features::{schema_hash, CanonicalRecord, Feature, FEATURE_COUNT, SCHEMA_VERSION};
use link_layer::Identity;
use serde::{Deserialize, Serialize};

/// Statistics of the model on its own training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingBaseline {
    /// Mean absolute reconstruction error per feature, original units
    pub error_scale: Vec<f64>,
    pub score_min: f64,
    pub score_mean: f64,
    pub threshold_quantile: f64,
    /// Training score at `threshold_quantile`
    pub threshold: f64,
}

/// Everything needed to score one satellite. Immutable once trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub identity: Identity,
    pub norad_id: u32,
    pub schema_version: u8,
    pub schema_hash: u32,
    pub trained_at: DateTime<Utc>,
    pub training_records: usize,
    /// Fixed feature subset, in schema order
    pub features: Vec<Feature>,
    pub scaler: FeatureScaler,
    pub model: ReconstructionModel,
    pub baseline: TrainingBaseline,
}

/// Raw scorer output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    /// Mean squared reconstruction error in scaled units
    pub aggregate: f64,
    /// Absolute error per model feature, original units
    pub errors: Vec<(Feature, f64)>,
}

impl ModelArtifact {
    pub fn matches_schema(&self) -> bool {
        self.schema_version == SCHEMA_VERSION && self.schema_hash == schema_hash()
    }

    /// Check that the scaler, weights and baseline all describe the same
    /// feature subset. Scoring relies on this and does no bounds checks of
    /// its own.
    pub fn validate(&self) -> Result<(), StoreError> {
        let corrupt = |reason: String| -> Result<(), StoreError> {
            Err(StoreError::CorruptArtifact {
                identity: self.identity,
                reason,
            })
        };

        let n = self.features.len();
        if n == 0 || n > FEATURE_COUNT {
            return corrupt(format!("{} features, expected 1 to {}", n, FEATURE_COUNT));
        }
        if !self.features.windows(2).all(|w| w[0] < w[1]) {
            return corrupt("features are not unique and in schema order".to_string());
        }

        let lengths = [
            ("scaler mean", self.scaler.mean.len()),
            ("scaler scale", self.scaler.scale.len()),
            ("error scale", self.baseline.error_scale.len()),
            ("model width", self.model.n),
        ];
        for (part, len) in lengths {
            if len != n {
                return corrupt(format!("{} has {} entries for {} features", part, len, n));
            }
        }
        if self.model.weights.len() != n * n {
            return corrupt(format!("{} weights for {} features", self.model.weights.len(), n));
        }

        if self.scaler.mean.iter().any(|m| !m.is_finite()) {
            return corrupt("non-finite scaler mean".to_string());
        }
        if let Some(i) = self.scaler.scale.iter().position(|s| !s.is_finite() || *s <= 0.0) {
            return corrupt(format!("scale of {} is {}", self.features[i], self.scaler.scale[i]));
        }
        if let Some(i) = self.baseline.error_scale.iter().position(|e| !e.is_finite() || *e <= 0.0) {
            return corrupt(format!(
                "error scale of {} is {}",
                self.features[i], self.baseline.error_scale[i]
            ));
        }
        if self.model.weights.iter().any(|w| !w.is_finite()) {
            return corrupt("non-finite weight".to_string());
        }
        if (0..n).any(|j| self.model.weights[j * n + j] != 0.0) {
            return corrupt("weight matrix diagonal is not zero".to_string());
        }
        if !self.baseline.threshold.is_finite() {
            return corrupt(format!("threshold is {}", self.baseline.threshold));
        }
        Ok(())
    }

    /// Score one record. Every model feature must be present.
    pub fn score(&self, record: &CanonicalRecord) -> Result<Score, ScoreError> {
        if record.identity != self.identity {
            return Err(ScoreError::IdentityMismatch {
                expected: self.identity,
                found: record.identity,
            });
        }

        let n = self.features.len();
        let mut x = [0.0; FEATURE_COUNT];
        for (slot, &feature) in x.iter_mut().zip(&self.features) {
            *slot = record
                .value(feature)
                .ok_or(ScoreError::IncompleteRecord {
                    identity: self.identity,
                    feature,
                })?;
        }

        let (aggregate, errors) = self.reconstruction_errors(&x[..n]);
        Ok(Score {
            aggregate,
            errors: self.features.iter().copied().zip(errors[..n].iter().copied()).collect(),
        })
    }

    /// Aggregate score and per-feature absolute errors for a complete row
    pub(crate) fn reconstruction_errors(&self, values: &[f64]) -> (f64, [f64; FEATURE_COUNT]) {
        let n = values.len();
        let mut z = [0.0; FEATURE_COUNT];
        let mut z_hat = [0.0; FEATURE_COUNT];
        let mut errors = [0.0; FEATURE_COUNT];

        self.scaler.transform(values, &mut z[..n]);
        self.model.reconstruct(&z[..n], &mut z_hat[..n]);

        let mut sum_sq = 0.0;
        for j in 0..n {
            let diff = z[j] - z_hat[j];
            sum_sq += diff * diff;
            errors[j] = (values[j] - self.scaler.inverse_one(j, z_hat[j])).abs();
        }

        let aggregate = if n == 0 { 0.0 } else { sum_sq / n as f64 };
        (aggregate, errors)
    }
}
