//! Ordinary least-squares regression over [`FeatureVector`]s.
//!
//! Features are centred before solving the normal equations, which keeps the
//! intercept out of the linear system and makes the fit well conditioned for
//! the small, bounded inputs used here. A feature that carries no
//! information (constant, or a linear combination of earlier ones) gets a
//! zero coefficient instead of failing the fit.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::features::FeatureVector;

// ---

const N: usize = FeatureVector::LEN;

/// Relative pivot size below which a feature is treated as redundant.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Held-out share (percent) and RNG seed shared by all targets of a run.
pub const TEST_PERCENT: usize = 20;
pub const SPLIT_SEED: u64 = 42;

/// Reproducible train/validation partition of row indices.
///
/// Computed once per run and applied to every target, so the three models
/// see identical rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..rows` with `seed` and hold out `ceil(rows * test_percent / 100)`.
    ///
    /// At least one row is always kept for training, so a single-row input
    /// yields an empty test set.
    pub fn new(rows: usize, test_percent: usize, seed: u64) -> Self {
        // ---
        let mut indices: Vec<usize> = (0..rows).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let test_len = (rows * test_percent)
            .div_ceil(100)
            .min(rows.saturating_sub(1));
        let train = indices.split_off(test_len);

        TrainTestSplit {
            train,
            test: indices,
        }
    }

    /// Gather `values` at the given row indices.
    pub fn pick<T: Copy>(values: &[T], rows: &[usize]) -> Vec<T> {
        rows.iter().map(|&i| values[i]).collect()
    }
}

/// Hold-out quality of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Coefficient of determination. Reported as `0.0` when the held-out
    /// targets have no variance.
    pub r2: f64,
    pub samples: usize,
}

impl RegressionMetrics {
    /// Compare predictions against actual values. `None` for empty input.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        // ---
        if actual.is_empty() || actual.len() != predicted.len() {
            return None;
        }

        let n = actual.len() as f64;
        let mean = actual.iter().sum::<f64>() / n;

        let mut abs_sum = 0.0;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (a, p) in actual.iter().zip(predicted) {
            abs_sum += (a - p).abs();
            ss_res += (a - p).powi(2);
            ss_tot += (a - mean).powi(2);
        }

        let r2 = if ss_tot <= f64::EPSILON * n * mean.abs().max(1.0) {
            tracing::warn!(
                "Held-out targets have zero variance over {} sample(s); R² reported as 0",
                actual.len()
            );
            0.0
        } else {
            1.0 - ss_res / ss_tot
        };

        Some(RegressionMetrics {
            mae: abs_sum / n,
            rmse: (ss_res / n).sqrt(),
            r2,
            samples: actual.len(),
        })
    }
}

/// A fitted `y = intercept + Σ coefficient_i · x_i` model.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: [f64; N],
    pub n_observations: usize,
}

impl LinearModel {
    /// Fit by least squares. Returns `None` when there are no rows.
    pub fn fit(features: &[FeatureVector], targets: &[f64]) -> Option<Self> {
        // ---
        if features.is_empty() || features.len() != targets.len() {
            return None;
        }

        let n = features.len() as f64;
        let rows: Vec<[f64; N]> = features.iter().map(FeatureVector::to_array).collect();

        let mut x_mean = [0.0; N];
        for row in &rows {
            for (m, x) in x_mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let y_mean = targets.iter().sum::<f64>() / n;

        // Centred normal equations: (XᵀX) b = Xᵀy
        let mut xtx = [[0.0; N]; N];
        let mut xty = [0.0; N];
        for (row, &y) in rows.iter().zip(targets) {
            let dx: [f64; N] = std::array::from_fn(|j| row[j] - x_mean[j]);
            let dy = y - y_mean;
            for i in 0..N {
                xty[i] += dx[i] * dy;
                for j in 0..N {
                    xtx[i][j] += dx[i] * dx[j];
                }
            }
        }

        let coefficients = solve_symmetric(xtx, xty);
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(b, m)| b * m)
                .sum::<f64>();

        Some(LinearModel {
            intercept,
            coefficients,
            n_observations: features.len(),
        })
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.to_array())
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }

    pub fn evaluate(
        &self,
        features: &[FeatureVector],
        targets: &[f64],
    ) -> Option<RegressionMetrics> {
        let predicted: Vec<f64> = features.iter().map(|f| self.predict(f)).collect();
        RegressionMetrics::compute(targets, &predicted)
    }
}

/// Solve a symmetric positive semi-definite system by Gaussian elimination.
///
/// A vanishing pivot means the variable is linearly dependent on the ones
/// already eliminated; its whole remaining row and column are then zero, so
/// it is skipped and its coefficient fixed at zero.
fn solve_symmetric(mut a: [[f64; N]; N], mut b: [f64; N]) -> [f64; N] {
    // ---
    let scale = (0..N).map(|i| a[i][i]).fold(0.0_f64, f64::max).max(1.0);
    let mut active = [true; N];

    for k in 0..N {
        if a[k][k] <= PIVOT_TOLERANCE * scale {
            active[k] = false;
            continue;
        }
        for i in (k + 1)..N {
            let factor = a[i][k] / a[k][k];
            for j in k..N {
                a[i][j] -= factor * a[k][j];
            }
            b[i] -= factor * b[k];
        }
    }

    let mut x = [0.0; N];
    for k in (0..N).rev() {
        if !active[k] {
            continue;
        }
        let tail: f64 = ((k + 1)..N).map(|j| a[k][j] * x[j]).sum();
        x[k] = (b[k] - tail) / a[k][k];
    }
    x
}
