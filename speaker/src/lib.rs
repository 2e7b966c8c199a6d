//! Speaker modeling for voice verification.
//!
//! # Architecture
//!
//! The pipeline turns a recorded utterance into a score in three stages:
//!
//! 1. [`mfcc::extract`]: mono f32 audio -> 39-dim MFCC feature rows
//! 2. [`Scaler`]: per-dimension statistics fit at enrollment, replayed
//!    at every later verification
//! 3. [`DiagGmm`]: diagonal-covariance Gaussian mixture fit by EM;
//!    scoring is the mean per-frame log-likelihood
//!
//! # Feature Extraction
//!
//! The [`mfcc`] module computes 13 cepstral coefficients per 25ms frame
//! (10ms shift) plus first- and second-order deltas:
//! - Pre-emphasis 0.97, per-frame DC removal
//! - Povey window (hamming^0.85)
//! - Cooley-Tukey FFT + triangular mel filterbank
//! - Orthonormal DCT-II over log mel energies
//! - +/-2-frame regression deltas with replicated edges
//!
//! Input at any sample rate is resampled to the fixed 16 kHz analysis rate
//! by the [`resample`] module before framing.

pub mod error;
pub mod gmm;
pub mod mfcc;
pub mod resample;
pub mod scaler;

pub use error::{DimensionMismatch, ExtractionError, TrainingError};
pub use gmm::{DiagGmm, GmmConfig};
pub use mfcc::{extract, MfccConfig};
pub use resample::{to_analysis_rate, ANALYSIS_RATE};
pub use scaler::Scaler;

/// One utterance's features: one 39-dim row per analysis frame.
pub type FeatureMatrix = Vec<Vec<f32>>;
