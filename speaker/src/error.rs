use thiserror::Error;

/// Errors returned by feature extraction.
///
/// All of these mean "no usable signal", not a crash: the caller treats a
/// failed extraction as an aborted enrollment or verification attempt.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("empty audio signal")]
    EmptySignal,

    #[error("audio too short: need at least {min_samples} samples at the analysis rate, got {got_samples}")]
    TooShort {
        min_samples: usize,
        got_samples: usize,
    },

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("non-finite sample at index {0}")]
    NonFinite(usize),

    #[error("resample error: {0}")]
    Resample(String),
}

/// Errors returned by mixture model training.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("empty feature matrix")]
    Empty,

    #[error("too few frames: {rows} rows cannot support {components} mixture components")]
    TooFewFrames { rows: usize, components: usize },

    #[error("feature row {row} has dimension {got}, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("non-finite feature value at row {row}, dimension {dim}")]
    NonFinite { row: usize, dim: usize },
}

/// A feature matrix was scored or transformed with statistics of a
/// different dimensionality.
#[derive(Debug, Error)]
#[error("feature dimension mismatch: expected {expected}, got {got}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub got: usize,
}
