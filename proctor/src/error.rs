use thiserror::Error;

use voicelock_kv::KvError;
use voicelock_speaker::{DimensionMismatch, ExtractionError, TrainingError};

/// Errors surfaced by enrollment, verification, and session operations.
///
/// A rejected utterance is not an error: it comes back as a
/// [`crate::VerificationOutcome`] with `accepted == false`. These variants
/// cover the cases where no outcome could be produced at all.
#[derive(Debug, Error)]
pub enum ProctorError {
    /// Verification was requested for an identity that never enrolled.
    #[error("no profile enrolled for {0:?}")]
    NoProfile(String),

    /// No usable signal in a clip; the attempt is aborted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Enrollment data could not support a model fit.
    #[error(transparent)]
    Training(#[from] TrainingError),

    /// Features do not match the profile's enrolled dimensionality.
    #[error(transparent)]
    Dimension(#[from] DimensionMismatch),

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] KvError),

    /// A stored profile blob could not be decoded.
    #[error("corrupt profile for {identity:?}: {reason}")]
    CorruptProfile { identity: String, reason: String },

    /// Enrollment was attempted without any clips.
    #[error("no enrollment clips provided")]
    NoClips,

    /// A checkpoint was requested on a session that already completed.
    #[error("session already completed")]
    SessionComplete,
}
