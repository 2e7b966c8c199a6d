//! voicelock - Voice authentication CLI for monitored exams.
//!
//! Enrollment and verification over recorded WAV files; the exit code
//! carries the verification decision for the surrounding exam tooling.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voicelock_kv::RedbStore;
use voicelock_proctor::{
    AudioClip, EnrollConfig, Enroller, ProfileStore, SessionConfig, SessionDecision,
    VerificationSession, Verifier, VerifyConfig,
};
use voicelock_speaker::{extract, FeatureMatrix, GmmConfig, MfccConfig};

/// Voice authentication for monitored exams.
#[derive(Parser, Debug)]
#[command(name = "voicelock")]
#[command(about = "Voice authentication for monitored exams")]
struct Args {
    /// Profile database path
    #[arg(long, default_value = "voicelock.redb")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register an identity from recorded WAV clips
    Enroll {
        identity: String,
        /// Enrollment clips (reference: 3 recordings of the same phrase)
        #[arg(required = true)]
        clips: Vec<PathBuf>,
        /// Mixture components for the voice model
        #[arg(long, default_value_t = 16)]
        components: usize,
    },
    /// Score one utterance against an enrolled identity
    Verify {
        identity: String,
        clip: PathBuf,
        /// Decision threshold on the mean per-frame log-likelihood
        #[arg(long, default_value_t = -50.0, allow_negative_numbers = true)]
        threshold: f64,
    },
    /// Run a monitored session, one clip per checkpoint
    Monitor {
        identity: String,
        #[arg(required = true)]
        clips: Vec<PathBuf>,
        #[arg(long, default_value_t = -50.0, allow_negative_numbers = true)]
        threshold: f64,
        /// Fraction of checkpoints that must accept
        #[arg(long, default_value_t = 0.7)]
        pass_ratio: f64,
    },
    /// List enrolled identities
    List,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = ProfileStore::new(
        RedbStore::open(&args.store)
            .with_context(|| format!("open profile store {}", args.store.display()))?,
    );

    match args.command {
        Command::Enroll {
            identity,
            clips,
            components,
        } => {
            let recorded: Vec<AudioClip> =
                clips.iter().map(|p| load_wav(p)).collect::<Result<_>>()?;
            let cfg = EnrollConfig {
                gmm: GmmConfig {
                    components,
                    ..GmmConfig::default()
                },
                ..EnrollConfig::default()
            };
            let profile = Enroller::new(store, cfg).enroll(&identity, &recorded)?;
            println!(
                "enrolled {} ({} clips, {} components)",
                profile.identity,
                recorded.len(),
                profile.model.components()
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::Verify {
            identity,
            clip,
            threshold,
        } => {
            let features = clip_features(&clip)?;
            let verifier = Verifier::new(store, VerifyConfig { threshold });
            let outcome = verifier.verify(&identity, &features)?;
            println!(
                "{}: score {:.2} vs threshold {:.2} -> {}",
                identity,
                outcome.score,
                outcome.threshold,
                if outcome.accepted { "accepted" } else { "rejected" }
            );
            Ok(if outcome.accepted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Monitor {
            identity,
            clips,
            threshold,
            pass_ratio,
        } => {
            let verifier = Verifier::new(store, VerifyConfig { threshold });
            let cfg = SessionConfig {
                checkpoints: clips.len(),
                pass_ratio,
            };
            let mut session = VerificationSession::new(&verifier, identity.as_str(), cfg);
            for (i, path) in clips.iter().enumerate() {
                let outcome = session.checkpoint(&clip_features(path)?)?;
                println!(
                    "checkpoint {}/{}: score {:.2} -> {}",
                    i + 1,
                    clips.len(),
                    outcome.score,
                    if outcome.accepted { "ok" } else { "failed" }
                );
            }
            let result = session.result().context("session did not complete")?;
            println!(
                "session {}: {}/{} checkpoints passed -> {}",
                identity, result.passed, result.total, result.decision
            );
            Ok(match result.decision {
                SessionDecision::Passed => ExitCode::SUCCESS,
                SessionDecision::Flagged => ExitCode::FAILURE,
            })
        }

        Command::List => {
            for identity in store.identities()? {
                println!("{identity}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads a WAV file as a mono f32 clip; multi-channel input is averaged.
fn load_wav(path: &Path) -> Result<AudioClip> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let samples = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn clip_features(path: &Path) -> Result<FeatureMatrix> {
    let clip = load_wav(path)?;
    let features = extract(&clip.samples, clip.sample_rate, &MfccConfig::default())
        .with_context(|| format!("extract features from {}", path.display()))?;
    Ok(features)
}
