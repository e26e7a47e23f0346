//! Training
//!
//! Fits the scaler and the reconstruction model for one satellite, then
//! replays the training rows through the fitted artifact to record the
//! baseline used for explanation and thresholding.

use crate::artifact::{ModelArtifact, TrainingBaseline};
use crate::model::ReconstructionModel;
use crate::scaler::{feature_std, names, FeatureScaler};
use crate::TrainError;
use chrono::Utc;
use golden_features::{schema_hash, CanonicalRecord, Feature, SCHEMA_VERSION};
use link_layer::Identity;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Ridge penalty on the scaled normal equations
    pub ridge_lambda: f64,
    /// Deviations at or below this are treated as zero variance
    pub min_std: f64,
    pub min_records: usize,
    /// Training-score quantile used as the default alert threshold
    pub threshold_quantile: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            ridge_lambda: 1e-3,
            min_std: 1e-9,
            min_records: 16,
            threshold_quantile: 0.99,
        }
    }
}

/// Drop candidates that are never populated or have zero variance in
/// `records`. The result is in schema order.
pub fn select_features(
    candidates: &[Feature],
    records: &[CanonicalRecord],
    min_std: f64,
) -> Vec<Feature> {
    let mut selected = Vec::with_capacity(candidates.len());
    for &feature in Feature::ALL.iter().filter(|f| candidates.contains(f)) {
        match feature_std(records.iter().filter_map(|r| r.value(feature))) {
            None => warn!(%feature, "excluding feature: never populated"),
            Some(std) if std <= min_std => {
                warn!(%feature, std, "excluding feature: zero variance")
            }
            Some(_) => selected.push(feature),
        }
    }
    selected
}

/// Train a model for `identity` over `features`.
///
/// Records missing any of `features` are skipped; the remainder must still
/// satisfy `config.min_records`.
pub fn train(
    identity: Identity,
    features: &[Feature],
    records: &[CanonicalRecord],
    config: &TrainerConfig,
) -> Result<ModelArtifact, TrainError> {
    let first = records.first().ok_or(TrainError::NoRecords)?;
    if let Some(foreign) = records.iter().find(|r| r.identity != identity) {
        return Err(TrainError::ForeignRecord {
            expected: identity,
            found: foreign.identity,
        });
    }

    let features: Vec<Feature> = Feature::ALL
        .into_iter()
        .filter(|f| features.contains(f))
        .collect();
    if features.is_empty() {
        return Err(TrainError::EmptyFeatureSet);
    }
    let n = features.len();

    let rows: Vec<Vec<f64>> = records
        .iter()
        .filter_map(|r| features.iter().map(|&f| r.value(f)).collect::<Option<Vec<f64>>>())
        .collect();
    let skipped = records.len() - rows.len();
    if skipped > 0 {
        warn!(%identity, skipped, "skipping incomplete training records");
    }
    if rows.len() < config.min_records {
        return Err(TrainError::InsufficientRecords {
            found: rows.len(),
            required: config.min_records,
        });
    }

    let (scaler, degenerate) = FeatureScaler::fit(&rows, n, config.min_std);
    if let Some(i) = degenerate {
        return Err(TrainError::ZeroVarianceFeature(features[i]));
    }

    let scaled: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| {
            let mut z = vec![0.0; n];
            scaler.transform(row, &mut z);
            z
        })
        .collect();
    let model =
        ReconstructionModel::fit(&scaled, n, config.ridge_lambda).ok_or(TrainError::SingularSystem)?;

    let mut artifact = ModelArtifact {
        identity,
        norad_id: first.norad_id,
        schema_version: SCHEMA_VERSION,
        schema_hash: schema_hash(),
        trained_at: Utc::now(),
        training_records: rows.len(),
        features,
        scaler,
        model,
        baseline: TrainingBaseline {
            error_scale: Vec::new(),
            score_min: 0.0,
            score_mean: 0.0,
            threshold_quantile: config.threshold_quantile,
            threshold: 0.0,
        },
    };
    artifact.baseline = baseline(&artifact, &rows, config.threshold_quantile);

    info!(
        %identity,
        records = rows.len(),
        features = ?names(&artifact.features),
        threshold = artifact.baseline.threshold,
        "model trained"
    );
    Ok(artifact)
}

fn baseline(artifact: &ModelArtifact, rows: &[Vec<f64>], quantile: f64) -> TrainingBaseline {
    let n = artifact.features.len();
    let mut error_sum = vec![0.0; n];
    let mut scores = Vec::with_capacity(rows.len());

    for row in rows {
        let (score, errors) = artifact.reconstruction_errors(row);
        for (sum, e) in error_sum.iter_mut().zip(&errors[..n]) {
            *sum += e;
        }
        scores.push(score);
    }

    let count = rows.len() as f64;
    let error_scale = error_sum
        .iter()
        .zip(&artifact.scaler.scale)
        .map(|(sum, scale)| (sum / count).max(scale * 1e-6))
        .collect();

    scores.sort_by(|a, b| a.total_cmp(b));
    TrainingBaseline {
        error_scale,
        score_min: scores.first().copied().unwrap_or(0.0),
        score_mean: scores.iter().sum::<f64>() / count,
        threshold_quantile: quantile,
        threshold: quantile_of(&scores, quantile),
    }
}

/// Nearest-rank quantile of sorted values
fn quantile_of(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}
