use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::FeatureMatrix;

/// Configures mixture model training.
///
/// Defaults match the reference operating point: 16 diagonal-covariance
/// components, up to 200 EM iterations, fixed seed for reproducible fits.
#[derive(Debug, Clone)]
pub struct GmmConfig {
    /// Number of mixture components (default: 16).
    pub components: usize,
    /// Maximum EM iterations (default: 200).
    pub max_iter: usize,
    /// Convergence threshold on the change in average log-likelihood
    /// between iterations (default: 1e-3).
    pub tol: f64,
    /// Added to every variance so no dimension collapses (default: 1e-6).
    pub var_floor: f64,
    /// PRNG seed for initialization (default: 42). The same data and seed
    /// always produce the same model.
    pub seed: u64,
}

impl Default for GmmConfig {
    fn default() -> Self {
        Self {
            components: 16,
            max_iter: 200,
            tol: 1e-3,
            var_floor: 1e-6,
            seed: 42,
        }
    }
}

/// A mixture of diagonal-covariance multivariate Gaussians.
///
/// # Algorithm
///
/// [`DiagGmm::train`] fits the mixture by expectation-maximization:
///
/// 1. Init: `K` distinct rows drawn with a seeded PRNG become the initial
///    means; every component starts with the global per-dimension variance
///    and uniform weight.
/// 2. E-step: per-row component responsibilities via log-sum-exp.
/// 3. M-step: re-estimate weights, means, and floored variances from the
///    responsibility-weighted data.
/// 4. Stop when the average log-likelihood improves by less than `tol`,
///    or after `max_iter` iterations.
///
/// Diagonal covariance keeps the parameter count tractable for the short
/// enrollment recordings this models; a full covariance matrix would be
/// over-parameterized for that amount of data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagGmm {
    weights: Vec<f64>,
    means: Vec<Vec<f64>>,
    vars: Vec<Vec<f64>>,
}

impl DiagGmm {
    /// Fits a mixture to the given feature rows.
    ///
    /// The rows are treated as exchangeable samples; temporal order does
    /// not influence the fit.
    pub fn train(features: &FeatureMatrix, cfg: &GmmConfig) -> Result<DiagGmm, TrainingError> {
        let rows = features.len();
        if rows == 0 {
            return Err(TrainingError::Empty);
        }
        let dim = features[0].len();
        if dim == 0 {
            return Err(TrainingError::Empty);
        }
        for (i, row) in features.iter().enumerate() {
            if row.len() != dim {
                return Err(TrainingError::RaggedRow {
                    row: i,
                    got: row.len(),
                    expected: dim,
                });
            }
            if let Some(d) = row.iter().position(|v| !v.is_finite()) {
                return Err(TrainingError::NonFinite { row: i, dim: d });
            }
        }
        let k = cfg.components.max(1);
        if rows < k {
            return Err(TrainingError::TooFewFrames {
                rows,
                components: k,
            });
        }

        let data: Vec<Vec<f64>> = features
            .iter()
            .map(|row| row.iter().map(|&v| v as f64).collect())
            .collect();

        let mut model = init_model(&data, k, cfg);

        // EM iterations.
        let mut resp = vec![vec![0.0f64; k]; rows];
        let mut prev_avg_ll = f64::NEG_INFINITY;
        for _ in 0..cfg.max_iter {
            // E-step: responsibilities and total log-likelihood.
            let mut total_ll = 0.0f64;
            for (i, x) in data.iter().enumerate() {
                let r = &mut resp[i];
                for c in 0..k {
                    r[c] = model.weights[c].ln() + log_pdf(x, &model.means[c], &model.vars[c]);
                }
                let lse = log_sum_exp(r);
                total_ll += lse;
                for v in r.iter_mut() {
                    *v = (*v - lse).exp();
                }
            }
            let avg_ll = total_ll / rows as f64;
            if (avg_ll - prev_avg_ll).abs() < cfg.tol {
                break;
            }
            prev_avg_ll = avg_ll;

            // M-step.
            for c in 0..k {
                let nk: f64 = resp.iter().map(|r| r[c]).sum();
                if nk < 1e-10 {
                    // Starved component: leave its parameters in place.
                    continue;
                }
                model.weights[c] = nk / rows as f64;

                let mean = &mut model.means[c];
                mean.iter_mut().for_each(|m| *m = 0.0);
                for (i, x) in data.iter().enumerate() {
                    let w = resp[i][c];
                    for d in 0..dim {
                        mean[d] += w * x[d];
                    }
                }
                for m in mean.iter_mut() {
                    *m /= nk;
                }

                let var = &mut model.vars[c];
                var.iter_mut().for_each(|v| *v = 0.0);
                for (i, x) in data.iter().enumerate() {
                    let w = resp[i][c];
                    for d in 0..dim {
                        let diff = x[d] - model.means[c][d];
                        var[d] += w * diff * diff;
                    }
                }
                for v in model.vars[c].iter_mut() {
                    *v = *v / nk + cfg.var_floor;
                }
            }
            let wsum: f64 = model.weights.iter().sum();
            for w in &mut model.weights {
                *w /= wsum;
            }
        }

        Ok(model)
    }

    /// Mean per-frame log-likelihood of the rows under the mixture.
    ///
    /// Averaging over frames (rather than summing) keeps the score roughly
    /// invariant to utterance length. Returns negative infinity for an
    /// empty matrix.
    ///
    /// Rows must have the model's dimensionality.
    pub fn avg_log_likelihood(&self, features: &FeatureMatrix) -> f64 {
        if features.is_empty() {
            return f64::NEG_INFINITY;
        }
        let k = self.weights.len();
        let mut terms = vec![0.0f64; k];
        let mut total = 0.0f64;
        for row in features {
            assert_eq!(
                row.len(),
                self.dimension(),
                "gmm: feature dimension mismatch"
            );
            let x: Vec<f64> = row.iter().map(|&v| v as f64).collect();
            for c in 0..k {
                terms[c] = self.weights[c].ln() + log_pdf(&x, &self.means[c], &self.vars[c]);
            }
            total += log_sum_exp(&terms);
        }
        total / features.len() as f64
    }

    /// Number of mixture components.
    pub fn components(&self) -> usize {
        self.weights.len()
    }

    /// Dimensionality of the fitted feature space.
    pub fn dimension(&self) -> usize {
        self.means.first().map(|m| m.len()).unwrap_or(0)
    }

    /// Component weights; always sum to 1.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Seeded initialization: K distinct rows as means, global variance,
/// uniform weights.
fn init_model(data: &[Vec<f64>], k: usize, cfg: &GmmConfig) -> DiagGmm {
    let rows = data.len();
    let dim = data[0].len();

    // Global per-dimension variance as the starting spread.
    let mut global_mean = vec![0.0f64; dim];
    for x in data {
        for d in 0..dim {
            global_mean[d] += x[d];
        }
    }
    for m in &mut global_mean {
        *m /= rows as f64;
    }
    let mut global_var = vec![0.0f64; dim];
    for x in data {
        for d in 0..dim {
            let diff = x[d] - global_mean[d];
            global_var[d] += diff * diff;
        }
    }
    for v in &mut global_var {
        *v = *v / rows as f64 + cfg.var_floor;
    }

    // Partial Fisher-Yates: the first k entries become the seed rows.
    let mut rng = Xoshiro256ss::new(cfg.seed);
    let mut indices: Vec<usize> = (0..rows).collect();
    for i in 0..k {
        let j = i + (rng.next_u64() as usize) % (rows - i);
        indices.swap(i, j);
    }

    DiagGmm {
        weights: vec![1.0 / k as f64; k],
        means: indices[..k].iter().map(|&i| data[i].clone()).collect(),
        vars: vec![global_var; k],
    }
}

/// Log-density of a diagonal Gaussian at `x`.
fn log_pdf(x: &[f64], mean: &[f64], var: &[f64]) -> f64 {
    let mut acc = 0.0f64;
    for d in 0..x.len() {
        let diff = x[d] - mean[d];
        acc += (2.0 * PI * var[d]).ln() + diff * diff / var[d];
    }
    -0.5 * acc
}

/// Numerically stable log(sum(exp(terms))).
fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    let sum: f64 = terms.iter().map(|t| (t - max).exp()).sum();
    max + sum.ln()
}

// ---------------------------------------------------------------------------
// Xoshiro256** PRNG seeded via SplitMix64. Drives initialization only, so a
// fixed seed makes training fully reproducible.
// ---------------------------------------------------------------------------

struct Xoshiro256ss {
    s: [u64; 4],
}

impl Xoshiro256ss {
    fn new(seed: u64) -> Self {
        // SplitMix64 to initialize state from single seed.
        let mut z = seed;
        let mut s = [0u64; 4];
        for slot in &mut s {
            z = z.wrapping_add(0x9e3779b97f4a7c15);
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            *slot = z ^ (z >> 31);
        }
        Self { s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.s[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform [0, 1) from the top 53 bits.
    #[cfg(test)]
    fn float64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller standard normal; used to synthesize test data.
    #[cfg(test)]
    fn norm_float64(&mut self) -> f64 {
        loop {
            let u1 = self.float64();
            let u2 = self.float64();
            if u1 > 0.0 {
                let mag = (-2.0 * u1.ln()).sqrt();
                return mag * (2.0 * PI * u2).cos();
            }
        }
    }
}
