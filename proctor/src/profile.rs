use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use voicelock_speaker::{DiagGmm, Scaler};

/// A stored voice profile: everything needed to score a later utterance.
///
/// The scaler and model are a matched pair — the model was trained on
/// features standardized by exactly this scaler, so scoring must replay it.
/// Profiles are replaced wholesale on re-enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub identity: String,
    pub scaler: Scaler,
    pub model: DiagGmm,
    pub enrolled_at: DateTime<Utc>,
}

impl SpeakerProfile {
    /// Encodes the profile as a JSON blob for the store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a profile from a stored blob.
    pub fn from_bytes(data: &[u8]) -> Result<SpeakerProfile, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicelock_speaker::GmmConfig;

    fn sample_profile() -> SpeakerProfile {
        let features: Vec<Vec<f32>> = (0..40)
            .map(|i| vec![i as f32 * 0.1, (i % 7) as f32, 1.0 - i as f32 * 0.05])
            .collect();
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
        SpeakerProfile {
            identity: "alice".to_string(),
            scaler,
            model,
            enrolled_at: Utc::now(),
        }
    }

    #[test]
    fn json_roundtrip() {
        let profile = sample_profile();
        let blob = profile.to_bytes().unwrap();
        let back = SpeakerProfile::from_bytes(&blob).unwrap();

        assert_eq!(back.identity, "alice");
        assert_eq!(back.enrolled_at, profile.enrolled_at);
        assert_eq!(back.model.components(), 2);
        assert_eq!(back.scaler.dimension(), 3);
    }

    #[test]
    fn roundtrip_preserves_score() {
        let profile = sample_profile();
        let probe: Vec<Vec<f32>> = (0..10)
            .map(|i| vec![i as f32 * 0.2, (i % 3) as f32, 0.5])
            .collect();

        let normalized = profile.scaler.apply(&probe).unwrap();
        let before = profile.model.avg_log_likelihood(&normalized);

        let back = SpeakerProfile::from_bytes(&profile.to_bytes().unwrap()).unwrap();
        let normalized = back.scaler.apply(&probe).unwrap();
        let after = back.model.avg_log_likelihood(&normalized);

        assert!(
            (before - after).abs() < 1e-12,
            "persisted profile must score identically: {before} vs {after}"
        );
    }

    #[test]
    fn garbage_blob_fails_decode() {
        assert!(SpeakerProfile::from_bytes(b"not json").is_err());
    }
}
