use serde::{Deserialize, Serialize};

use crate::error::DimensionMismatch;
use crate::FeatureMatrix;

/// Per-dimension standardization statistics.
///
/// Fit once over the pooled enrollment features and persisted with the
/// profile; every later verification must replay the exact same statistics.
/// A model is only ever scored against features standardized by the scaler
/// it was trained with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Scaler {
    /// Fits per-dimension mean and standard deviation across all rows.
    ///
    /// Returns `None` for an empty matrix. Rows must share one
    /// dimensionality.
    pub fn fit(features: &FeatureMatrix) -> Option<Scaler> {
        if features.is_empty() {
            return None;
        }
        let dim = features[0].len();
        let t = features.len() as f64;

        let mut mean = vec![0.0f64; dim];
        for row in features {
            for (d, &v) in row.iter().enumerate() {
                mean[d] += v as f64;
            }
        }
        for m in &mut mean {
            *m /= t;
        }

        let mut std = vec![0.0f64; dim];
        for row in features {
            for (d, &v) in row.iter().enumerate() {
                let diff = v as f64 - mean[d];
                std[d] += diff * diff;
            }
        }
        for s in &mut std {
            *s = (*s / t).sqrt();
        }

        Some(Scaler { mean, std })
    }

    /// Standardizes each row: `(x - mean) / std` per dimension.
    ///
    /// Dimensions with zero variance are treated as already centered and
    /// map to 0.0.
    pub fn apply(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, DimensionMismatch> {
        let dim = self.mean.len();
        let mut out = Vec::with_capacity(features.len());
        for row in features {
            if row.len() != dim {
                return Err(DimensionMismatch {
                    expected: dim,
                    got: row.len(),
                });
            }
            let mut scaled = Vec::with_capacity(dim);
            for d in 0..dim {
                if self.std[d] == 0.0 {
                    scaled.push(0.0);
                } else {
                    scaled.push(((row[d] as f64 - self.mean[d]) / self.std[d]) as f32);
                }
            }
            out.push(scaled);
        }
        Ok(out)
    }

    /// Dimensionality the scaler was fit on.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_empty_is_none() {
        assert!(Scaler::fit(&Vec::new()).is_none());
    }

    #[test]
    fn fit_apply_standardizes() {
        let features = vec![
            vec![1.0f32, 10.0],
            vec![3.0, 20.0],
            vec![5.0, 30.0],
        ];
        let scaler = Scaler::fit(&features).unwrap();
        let scaled = scaler.apply(&features).unwrap();

        // Each dimension should come out with mean ~0 and std ~1.
        for d in 0..2 {
            let vals: Vec<f64> = scaled.iter().map(|r| r[d] as f64).collect();
            let mean: f64 = vals.iter().sum::<f64>() / vals.len() as f64;
            let var: f64 = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
                / vals.len() as f64;
            assert!(mean.abs() < 1e-6, "mean should be ~0, got {mean}");
            assert!((var - 1.0).abs() < 1e-5, "var should be ~1, got {var}");
        }
    }

    #[test]
    fn zero_variance_dimension_maps_to_zero() {
        let features = vec![vec![7.0f32, 1.0], vec![7.0, 2.0], vec![7.0, 3.0]];
        let scaler = Scaler::fit(&features).unwrap();
        let scaled = scaler.apply(&features).unwrap();
        for row in &scaled {
            assert_eq!(row[0], 0.0, "constant dimension must map to 0.0");
        }
    }

    #[test]
    fn apply_rejects_wrong_dimension() {
        let scaler = Scaler::fit(&vec![vec![1.0f32, 2.0], vec![3.0, 4.0]]).unwrap();
        let err = scaler.apply(&vec![vec![1.0f32, 2.0, 3.0]]).unwrap_err();
        assert_eq!(err.expected, 2);
        assert_eq!(err.got, 3);
    }

    #[test]
    fn apply_replays_enrollment_statistics() {
        // New data is standardized by the *fit* statistics, not its own.
        let enroll = vec![vec![0.0f32], vec![2.0]];
        let scaler = Scaler::fit(&enroll).unwrap();
        let scaled = scaler.apply(&vec![vec![4.0f32]]).unwrap();
        // mean=1, std=1 -> (4-1)/1 = 3.
        assert!((scaled[0][0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn serde_roundtrip() {
        let scaler = Scaler::fit(&vec![vec![1.0f32, 5.0], vec![3.0, 9.0]]).unwrap();
        let json = serde_json::to_string(&scaler).unwrap();
        let back: Scaler = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dimension(), 2);

        let data = vec![vec![2.0f32, 7.0]];
        assert_eq!(scaler.apply(&data).unwrap(), back.apply(&data).unwrap());
    }
}
