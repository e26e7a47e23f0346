//! Masked linear autoencoder
//!
//! Each scaled feature is reconstructed from every *other* scaled feature by
//! ridge regression. The weight matrix has a zero diagonal, so a feature can
//! never copy itself through: a reading that breaks the learned relations
//! reconstructs towards what its peers predict and keeps its error.
//!
//! ```text
//! ẑ_j = Σ_{k≠j} W[j,k] · z_k
//! (Z₋ⱼᵀZ₋ⱼ / N + λI) w_j = Z₋ⱼᵀ z_j / N
//! ```

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionModel {
    /// Row-major `n × n`, zero diagonal
    pub weights: Vec<f64>,
    pub n: usize,
}

impl ReconstructionModel {
    /// Fit on scaled, row-major samples. `None` when a ridge system is not
    /// positive definite.
    pub(crate) fn fit(scaled: &[Vec<f64>], n: usize, lambda: f64) -> Option<Self> {
        let mut weights = vec![0.0; n * n];
        if n < 2 {
            return Some(Self { weights, n });
        }

        let count = scaled.len() as f64;
        let mut gram = DMatrix::<f64>::zeros(n, n);
        for row in scaled {
            let z = DVector::from_column_slice(row);
            gram += &z * z.transpose();
        }
        gram /= count;

        for target in 0..n {
            let others: Vec<usize> = (0..n).filter(|&k| k != target).collect();
            let m = others.len();

            let mut a = DMatrix::<f64>::zeros(m, m);
            let mut b = DVector::<f64>::zeros(m);
            for (r, &i) in others.iter().enumerate() {
                for (c, &k) in others.iter().enumerate() {
                    a[(r, c)] = gram[(i, k)];
                }
                a[(r, r)] += lambda;
                b[r] = gram[(i, target)];
            }

            let w = a.cholesky()?.solve(&b);
            if w.iter().any(|x| !x.is_finite()) {
                return None;
            }
            for (r, &k) in others.iter().enumerate() {
                weights[target * n + k] = w[r];
            }
        }

        Some(Self { weights, n })
    }

    /// Reconstruct `z` into `out`; both have length `n`
    pub fn reconstruct(&self, z: &[f64], out: &mut [f64]) {
        for j in 0..self.n {
            let row = &self.weights[j * self.n..(j + 1) * self.n];
            out[j] = row.iter().zip(z).map(|(w, x)| w * x).sum();
        }
    }
}
