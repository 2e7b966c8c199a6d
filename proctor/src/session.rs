use std::fmt;

use tracing::{info, warn};

use voicelock_speaker::FeatureMatrix;

use crate::error::ProctorError;
use crate::verifier::{VerificationOutcome, Verifier};

/// Aggregate decision for a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDecision {
    /// Enough checkpoints accepted: the ratio cleared the configured bar.
    Passed,
    /// Too many rejected checkpoints; the exam is flagged for review.
    Flagged,
}

impl fmt::Display for SessionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Flagged => write!(f, "flagged"),
        }
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Completed(SessionDecision),
}

/// Configures the monitored-session protocol.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of verification checkpoints over the monitored period
    /// (default: 3; reference deployments use 2-3).
    pub checkpoints: usize,
    /// Fraction of checkpoints that must accept for the session to pass
    /// (default: 0.7). Below-one on purpose: a single noisy checkpoint
    /// is tolerated when the ratio still clears the bar.
    pub pass_ratio: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            checkpoints: 3,
            pass_ratio: 0.7,
        }
    }
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub identity: String,
    /// Every checkpoint outcome, in order.
    pub outcomes: Vec<VerificationOutcome>,
    pub passed: usize,
    pub total: usize,
    pub decision: SessionDecision,
}

/// Runs a bounded number of verification checkpoints and aggregates them
/// into one pass/fail outcome.
///
/// The session defines only how many checks run and how they combine.
/// Spacing between checkpoints is the caller's concern: the surrounding
/// monitor waits out its interval, records a clip, and calls
/// [`VerificationSession::checkpoint`]. A rejected checkpoint is recorded
/// and the protocol moves on; nothing is retried.
pub struct VerificationSession<'a> {
    verifier: &'a Verifier,
    identity: String,
    checkpoints: usize,
    pass_ratio: f64,
    outcomes: Vec<VerificationOutcome>,
    passed: usize,
}

impl<'a> VerificationSession<'a> {
    /// Creates a session for one identity. Out-of-range configuration
    /// falls back to the defaults.
    pub fn new(verifier: &'a Verifier, identity: impl Into<String>, cfg: SessionConfig) -> Self {
        let checkpoints = if cfg.checkpoints > 0 { cfg.checkpoints } else { 3 };
        let pass_ratio = if cfg.pass_ratio > 0.0 && cfg.pass_ratio <= 1.0 {
            cfg.pass_ratio
        } else {
            0.7
        };
        Self {
            verifier,
            identity: identity.into(),
            checkpoints,
            pass_ratio,
            outcomes: Vec::with_capacity(checkpoints),
            passed: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.outcomes.is_empty() {
            SessionState::NotStarted
        } else if self.outcomes.len() < self.checkpoints {
            SessionState::Running
        } else {
            SessionState::Completed(self.decision())
        }
    }

    /// Checkpoints still to run.
    pub fn remaining(&self) -> usize {
        self.checkpoints - self.outcomes.len()
    }

    /// Runs one verification checkpoint on the given utterance features.
    ///
    /// A rejected utterance is a recorded outcome, not an error; the
    /// session keeps going. Errors come from a missing profile, bad
    /// features, or calling again after the last checkpoint.
    pub fn checkpoint(
        &mut self,
        features: &FeatureMatrix,
    ) -> Result<VerificationOutcome, ProctorError> {
        if matches!(self.state(), SessionState::Completed(_)) {
            return Err(ProctorError::SessionComplete);
        }

        let outcome = self.verifier.verify(&self.identity, features)?;
        if outcome.accepted {
            self.passed += 1;
        } else {
            warn!(
                identity = %self.identity,
                checkpoint = self.outcomes.len() + 1,
                total = self.checkpoints,
                score = outcome.score,
                "verification checkpoint failed; session may be flagged"
            );
        }
        self.outcomes.push(outcome.clone());

        if let SessionState::Completed(decision) = self.state() {
            info!(
                identity = %self.identity,
                passed = self.passed,
                total = self.checkpoints,
                %decision,
                "verification session completed"
            );
        }
        Ok(outcome)
    }

    /// The aggregate result, once all checkpoints have run.
    pub fn result(&self) -> Option<SessionResult> {
        match self.state() {
            SessionState::Completed(decision) => Some(SessionResult {
                identity: self.identity.clone(),
                outcomes: self.outcomes.clone(),
                passed: self.passed,
                total: self.checkpoints,
                decision,
            }),
            _ => None,
        }
    }

    fn decision(&self) -> SessionDecision {
        if self.passed as f64 / self.checkpoints as f64 >= self.pass_ratio {
            SessionDecision::Passed
        } else {
            SessionDecision::Flagged
        }
    }
}
