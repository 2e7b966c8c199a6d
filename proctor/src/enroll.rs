use chrono::Utc;
use tracing::info;

use voicelock_speaker::{extract, DiagGmm, GmmConfig, MfccConfig, Scaler, TrainingError};

use crate::error::ProctorError;
use crate::profile::SpeakerProfile;
use crate::store::ProfileStore;

/// One recorded utterance: mono f32 samples plus their sample rate.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Configures enrollment.
///
/// The feature and mixture settings are baked into the trained profile;
/// verifying later with different settings invalidates the comparison, so
/// both live here and nowhere else.
#[derive(Debug, Clone, Default)]
pub struct EnrollConfig {
    pub mfcc: MfccConfig,
    pub gmm: GmmConfig,
}

/// Builds and persists voice profiles.
///
/// Enrollment pools the features of every clip (reference: 3 recordings of
/// the same phrase) into one matrix before fitting, so the model captures
/// the speaker's range of variability rather than a single take.
pub struct Enroller {
    store: ProfileStore,
    cfg: EnrollConfig,
}

impl Enroller {
    pub fn new(store: ProfileStore, cfg: EnrollConfig) -> Self {
        Self { store, cfg }
    }

    /// Enrolls an identity from its recorded clips.
    ///
    /// Any extraction or training failure aborts before the store is
    /// touched: a failed enrollment never leaves a partial profile, and a
    /// failed re-enrollment leaves the previous profile in place. On
    /// success the identity's profile is replaced wholesale.
    pub fn enroll(
        &self,
        identity: &str,
        clips: &[AudioClip],
    ) -> Result<SpeakerProfile, ProctorError> {
        if clips.is_empty() {
            return Err(ProctorError::NoClips);
        }

        let mut pooled = Vec::new();
        for clip in clips {
            pooled.extend(extract(&clip.samples, clip.sample_rate, &self.cfg.mfcc)?);
        }

        let scaler =
            Scaler::fit(&pooled).ok_or(ProctorError::Training(TrainingError::Empty))?;
        let normalized = scaler.apply(&pooled)?;
        let model = DiagGmm::train(&normalized, &self.cfg.gmm)?;

        let profile = SpeakerProfile {
            identity: identity.to_string(),
            scaler,
            model,
            enrolled_at: Utc::now(),
        };
        self.store.save(&profile)?;

        info!(
            identity,
            clips = clips.len(),
            frames = pooled.len(),
            components = profile.model.components(),
            "voice profile enrolled"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicelock_kv::MemoryStore;

    /// A crude synthetic "voice": a fundamental plus two harmonics.
    fn voice_clip(f0: f64, seconds: f64) -> AudioClip {
        let n = (seconds * 16000.0) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / 16000.0;
                let w = 2.0 * std::f64::consts::PI * t;
                (0.5 * (f0 * w).sin() + 0.25 * (2.0 * f0 * w).sin() + 0.12 * (3.0 * f0 * w).sin())
                    as f32
            })
            .collect();
        AudioClip {
            samples,
            sample_rate: 16000,
        }
    }

    fn test_config() -> EnrollConfig {
        EnrollConfig {
            gmm: GmmConfig {
                components: 4,
                ..GmmConfig::default()
            },
            ..EnrollConfig::default()
        }
    }

    #[test]
    fn enroll_saves_profile() {
        let store = ProfileStore::new(MemoryStore::new());
        let enroller = Enroller::new(store.clone(), test_config());

        let clips = vec![
            voice_clip(120.0, 0.5),
            voice_clip(125.0, 0.5),
            voice_clip(118.0, 0.5),
        ];
        let profile = enroller.enroll("alice", &clips).unwrap();

        assert_eq!(profile.identity, "alice");
        assert_eq!(profile.scaler.dimension(), 39);
        assert_eq!(profile.model.components(), 4);
        assert!(store.exists("alice").unwrap());
    }

    #[test]
    fn enroll_no_clips() {
        let store = ProfileStore::new(MemoryStore::new());
        let enroller = Enroller::new(store, test_config());
        assert!(matches!(
            enroller.enroll("alice", &[]),
            Err(ProctorError::NoClips)
        ));
    }

    #[test]
    fn failed_extraction_leaves_no_profile() {
        let store = ProfileStore::new(MemoryStore::new());
        let enroller = Enroller::new(store.clone(), test_config());

        let clips = vec![
            voice_clip(120.0, 0.5),
            AudioClip {
                samples: Vec::new(),
                sample_rate: 16000,
            },
        ];
        assert!(matches!(
            enroller.enroll("alice", &clips),
            Err(ProctorError::Extraction(_))
        ));
        assert!(!store.exists("alice").unwrap());
    }

    #[test]
    fn failed_reenrollment_keeps_previous_profile() {
        let store = ProfileStore::new(MemoryStore::new());
        let enroller = Enroller::new(store.clone(), test_config());

        let good = vec![voice_clip(120.0, 0.5)];
        let first = enroller.enroll("alice", &good).unwrap();

        // Too-short clip: extraction fails, store untouched.
        let bad = vec![AudioClip {
            samples: vec![0.0; 100],
            sample_rate: 16000,
        }];
        assert!(enroller.enroll("alice", &bad).is_err());

        let loaded = store.load("alice").unwrap();
        assert_eq!(loaded.enrolled_at, first.enrolled_at);
    }

    #[test]
    fn too_few_frames_for_components() {
        let store = ProfileStore::new(MemoryStore::new());
        let enroller = Enroller::new(
            store,
            EnrollConfig {
                gmm: GmmConfig {
                    components: 64,
                    ..GmmConfig::default()
                },
                ..EnrollConfig::default()
            },
        );

        // 0.03s -> 480 samples -> 1 frame, far fewer than 64 components.
        let clips = vec![voice_clip(120.0, 0.03)];
        assert!(matches!(
            enroller.enroll("alice", &clips),
            Err(ProctorError::Training(TrainingError::TooFewFrames { .. }))
        ));
    }
}
