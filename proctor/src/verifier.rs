use chrono::{DateTime, Utc};
use tracing::debug;

use voicelock_speaker::FeatureMatrix;

use crate::error::ProctorError;
use crate::store::ProfileStore;

/// Controls the accept decision.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Mean per-frame log-likelihood above which an utterance is accepted
    /// (default: -50.0). An empirically chosen operating point, not a
    /// derived quantity; callers tune it for their feature and mixture
    /// settings.
    pub threshold: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self { threshold: -50.0 }
    }
}

/// Outcome of scoring one utterance against a stored profile.
///
/// Ephemeral: outcomes are returned to the caller and aggregated by a
/// session, never persisted here.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub identity: String,
    /// Mean per-frame log-likelihood under the profile's model.
    pub score: f64,
    /// Threshold the score was compared against.
    pub threshold: f64,
    /// `score > threshold`.
    pub accepted: bool,
    pub at: DateTime<Utc>,
}

/// Scores utterances against enrolled profiles.
///
/// Verification never mutates the profile: the same stored model and
/// statistics serve every check until the identity re-enrolls.
pub struct Verifier {
    store: ProfileStore,
    cfg: VerifyConfig,
}

impl Verifier {
    pub fn new(store: ProfileStore, cfg: VerifyConfig) -> Self {
        Self { store, cfg }
    }

    /// Verifies one utterance, already reduced to its feature rows.
    ///
    /// Looks up the identity's profile, standardizes the features with the
    /// profile's own enrollment statistics, and compares the mean per-frame
    /// log-likelihood against the threshold. Fails with
    /// [`ProctorError::NoProfile`] when the identity never enrolled.
    pub fn verify(
        &self,
        identity: &str,
        features: &FeatureMatrix,
    ) -> Result<VerificationOutcome, ProctorError> {
        let profile = self.store.load(identity)?;
        let normalized = profile.scaler.apply(features)?;
        let score = profile.model.avg_log_likelihood(&normalized);
        let accepted = score > self.cfg.threshold;

        debug!(
            identity,
            score,
            threshold = self.cfg.threshold,
            accepted,
            "utterance scored"
        );
        Ok(VerificationOutcome {
            identity: identity.to_string(),
            score,
            threshold: self.cfg.threshold,
            accepted,
            at: Utc::now(),
        })
    }

    /// The configured decision threshold.
    pub fn threshold(&self) -> f64 {
        self.cfg.threshold
    }

    /// The profile store backing this verifier.
    pub fn store(&self) -> &ProfileStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voicelock_kv::MemoryStore;
    use voicelock_speaker::{DiagGmm, GmmConfig, Scaler};

    use crate::profile::SpeakerProfile;

    /// Deterministic wobble so the fit has nonzero variance everywhere.
    fn wobble(i: usize, d: usize) -> f32 {
        (((i * 31 + d * 17) % 13) as f32 - 6.0) * 0.05
    }

    fn cluster(center: f32, n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| (0..4).map(|d| center + wobble(i, d)).collect())
            .collect()
    }

    fn enrolled_store(identity: &str, center: f32) -> ProfileStore {
        let features = cluster(center, 120);
        let scaler = Scaler::fit(&features).unwrap();
        let normalized = scaler.apply(&features).unwrap();
        let model = DiagGmm::train(
            &normalized,
            &GmmConfig {
                components: 2,
                ..GmmConfig::default()
            },
        )
        .unwrap();
        let store = ProfileStore::new(MemoryStore::new());
        store
            .save(&SpeakerProfile {
                identity: identity.to_string(),
                scaler,
                model,
                enrolled_at: Utc::now(),
            })
            .unwrap();
        store
    }

    #[test]
    fn no_profile_error() {
        let store = ProfileStore::new(MemoryStore::new());
        let verifier = Verifier::new(store, VerifyConfig::default());
        assert!(matches!(
            verifier.verify("ghost", &cluster(0.0, 10)),
            Err(ProctorError::NoProfile(id)) if id == "ghost"
        ));
    }

    #[test]
    fn same_distribution_accepted_different_rejected() {
        let store = enrolled_store("alice", 1.0);

        // Pick a threshold between the two scores, per the self-similarity
        // property: same-distribution data must clear it, distant data not.
        let probe_same = cluster(1.0, 40);
        let probe_other = cluster(50.0, 40);

        let scout = Verifier::new(store.clone(), VerifyConfig { threshold: 0.0 });
        let s_same = scout.verify("alice", &probe_same).unwrap().score;
        let s_other = scout.verify("alice", &probe_other).unwrap().score;
        assert!(
            s_same > s_other,
            "same-distribution probe must score higher: {s_same} vs {s_other}"
        );

        let mid = (s_same + s_other) / 2.0;
        let verifier = Verifier::new(store, VerifyConfig { threshold: mid });
        assert!(verifier.verify("alice", &probe_same).unwrap().accepted);
        assert!(!verifier.verify("alice", &probe_other).unwrap().accepted);
    }

    #[test]
    fn threshold_is_strictly_greater() {
        let store = enrolled_store("alice", 0.0);
        let probe = cluster(0.0, 30);

        let score = Verifier::new(store.clone(), VerifyConfig { threshold: -1e9 })
            .verify("alice", &probe)
            .unwrap()
            .score;

        // A threshold exactly at the score must reject: the rule is
        // score > threshold, not >=.
        let at = Verifier::new(store, VerifyConfig { threshold: score });
        assert!(!at.verify("alice", &probe).unwrap().accepted);
    }

    #[test]
    fn raising_threshold_never_flips_reject_to_accept() {
        let store = enrolled_store("alice", 0.0);
        let probe = cluster(0.0, 30);

        let score = Verifier::new(store.clone(), VerifyConfig { threshold: 0.0 })
            .verify("alice", &probe)
            .unwrap()
            .score;

        let low = Verifier::new(store.clone(), VerifyConfig { threshold: score - 1.0 })
            .verify("alice", &probe)
            .unwrap();
        let high = Verifier::new(store, VerifyConfig { threshold: score + 1.0 })
            .verify("alice", &probe)
            .unwrap();

        assert!(low.accepted);
        assert!(!high.accepted);
    }

    #[test]
    fn wrong_dimension_features_rejected() {
        let store = enrolled_store("alice", 0.0);
        let verifier = Verifier::new(store, VerifyConfig::default());
        let bad = vec![vec![0.0f32; 7]];
        assert!(matches!(
            verifier.verify("alice", &bad),
            Err(ProctorError::Dimension(_))
        ));
    }

    #[test]
    fn outcome_carries_threshold_and_time() {
        let store = enrolled_store("alice", 0.0);
        let verifier = Verifier::new(store, VerifyConfig { threshold: -7.5 });
        let outcome = verifier.verify("alice", &cluster(0.0, 10)).unwrap();
        assert_eq!(outcome.identity, "alice");
        assert_eq!(outcome.threshold, -7.5);
        assert!(outcome.at <= Utc::now());
    }
}
