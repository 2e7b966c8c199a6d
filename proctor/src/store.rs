use std::sync::Arc;

use voicelock_kv::KvStore;

use crate::error::ProctorError;
use crate::profile::SpeakerProfile;

const PROFILE_PREFIX: &str = "profile:";

/// Owns persisted speaker profiles, keyed by identity.
///
/// One profile per identity; saving overwrites the previous profile
/// wholesale. Whether a profile exists is the single source of truth for
/// "is this identity enrolled" — there is no separate registry to drift
/// out of sync.
///
/// Cloning yields a handle to the same backing store.
#[derive(Clone)]
pub struct ProfileStore {
    kv: Arc<dyn KvStore>,
}

impl ProfileStore {
    /// Creates a store over the given backend.
    pub fn new(kv: impl KvStore + 'static) -> Self {
        Self { kv: Arc::new(kv) }
    }

    fn key(identity: &str) -> String {
        format!("{PROFILE_PREFIX}{identity}")
    }

    /// Persists a profile, replacing any previous profile for the identity.
    pub fn save(&self, profile: &SpeakerProfile) -> Result<(), ProctorError> {
        let blob = profile
            .to_bytes()
            .map_err(|e| ProctorError::CorruptProfile {
                identity: profile.identity.clone(),
                reason: e.to_string(),
            })?;
        self.kv.set(&Self::key(&profile.identity), &blob)?;
        Ok(())
    }

    /// Loads the profile for an identity.
    pub fn load(&self, identity: &str) -> Result<SpeakerProfile, ProctorError> {
        let blob = self
            .kv
            .get(&Self::key(identity))?
            .ok_or_else(|| ProctorError::NoProfile(identity.to_string()))?;
        SpeakerProfile::from_bytes(&blob).map_err(|e| ProctorError::CorruptProfile {
            identity: identity.to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether an identity has an enrolled profile.
    pub fn exists(&self, identity: &str) -> Result<bool, ProctorError> {
        Ok(self.kv.get(&Self::key(identity))?.is_some())
    }

    /// Removes an identity's profile. Removing an absent profile is not an
    /// error.
    pub fn remove(&self, identity: &str) -> Result<(), ProctorError> {
        self.kv.delete(&Self::key(identity))?;
        Ok(())
    }

    /// All enrolled identities, sorted.
    pub fn identities(&self) -> Result<Vec<String>, ProctorError> {
        let keys = self.kv.scan_keys(PROFILE_PREFIX)?;
        Ok(keys
            .into_iter()
            .map(|k| k[PROFILE_PREFIX.len()..].to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voicelock_kv::MemoryStore;
    use voicelock_speaker::{DiagGmm, GmmConfig, Scaler};

    fn profile(identity: &str) -> SpeakerProfile {
        let features: Vec<Vec<f32>> = (0..30).map(|i| vec![i as f32, (i * i) as f32]).collect();
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
            identity: identity.to_string(),
            scaler,
            model,
            enrolled_at: Utc::now(),
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let store = ProfileStore::new(MemoryStore::new());
        store.save(&profile("alice")).unwrap();

        let loaded = store.load("alice").unwrap();
        assert_eq!(loaded.identity, "alice");
    }

    #[test]
    fn load_absent_is_no_profile() {
        let store = ProfileStore::new(MemoryStore::new());
        assert!(matches!(
            store.load("ghost"),
            Err(ProctorError::NoProfile(id)) if id == "ghost"
        ));
    }

    #[test]
    fn save_overwrites_previous_profile() {
        let store = ProfileStore::new(MemoryStore::new());
        let first = profile("alice");
        store.save(&first).unwrap();

        let second = profile("alice");
        store.save(&second).unwrap();

        let loaded = store.load("alice").unwrap();
        assert_eq!(loaded.enrolled_at, second.enrolled_at);
    }

    #[test]
    fn exists_tracks_save_and_remove() {
        let store = ProfileStore::new(MemoryStore::new());
        assert!(!store.exists("alice").unwrap());

        store.save(&profile("alice")).unwrap();
        assert!(store.exists("alice").unwrap());

        store.remove("alice").unwrap();
        assert!(!store.exists("alice").unwrap());
    }

    #[test]
    fn identities_reflects_saved_profiles() {
        let store = ProfileStore::new(MemoryStore::new());
        store.save(&profile("carol")).unwrap();
        store.save(&profile("alice")).unwrap();
        store.save(&profile("bob")).unwrap();

        assert_eq!(
            store.identities().unwrap(),
            vec!["alice".to_string(), "bob".to_string(), "carol".to_string()]
        );
    }

    #[test]
    fn corrupt_blob_surfaces_as_error() {
        let kv = MemoryStore::new();
        kv.set("profile:alice", b"{ truncated").unwrap();
        let store = ProfileStore::new(kv);
        assert!(matches!(
            store.load("alice"),
            Err(ProctorError::CorruptProfile { .. })
        ));
    }
}
