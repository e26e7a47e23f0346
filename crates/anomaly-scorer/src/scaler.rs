//! Standard scaler over a fixed feature subset

use golden_features::Feature;
use serde::{Deserialize, Serialize};

/// Per-feature mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler {
    /// Fit on row-major samples of width `n`. Returns the scaler and the index
    /// of the first feature whose deviation is at or below `min_std`.
    pub(crate) fn fit(rows: &[Vec<f64>], n: usize, min_std: f64) -> (Self, Option<usize>) {
        let count = rows.len() as f64;
        let mut mean = vec![0.0; n];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= count);

        let mut var = vec![0.0; n];
        for row in rows {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        let scale: Vec<f64> = var.iter().map(|s| (s / count).sqrt()).collect();
        let degenerate = scale.iter().position(|&s| s.is_nan() || s <= min_std);

        (Self { mean, scale }, degenerate)
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn transform(&self, values: &[f64], out: &mut [f64]) {
        for i in 0..self.len() {
            out[i] = (values[i] - self.mean[i]) / self.scale[i];
        }
    }

    pub fn inverse_one(&self, i: usize, scaled: f64) -> f64 {
        scaled * self.scale[i] + self.mean[i]
    }
}

/// Population standard deviation of one feature over the records that have it
pub fn feature_std(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some(var.sqrt())
}

/// Human-readable names for a feature list
pub(crate) fn names(features: &[Feature]) -> Vec<&'static str> {
    features.iter().map(|f| f.name()).collect()
}
