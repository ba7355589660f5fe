//! Arcade Session Transcripts
//!
//! This crate records what happened in a session and can prove it again.
//!
//! # Architecture
//!
//! - `SessionRecorder`: collects applied steps (ticks and accepted inputs)
//!   in the order the session guard let them through
//! - `verify_transcript`: rebuilds the game from its seed and tuning
//!   parameters, replays the steps and compares the outcome
//! - Transcript I/O: content-addressed files that are never overwritten

#![deny(unsafe_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use arcade_sim::{
    Action, GameState, OwnerId, RNG_ALGORITHM, STATE_DIGEST_ALGO_ID, SimError, Spawner, Tick,
    VariantParams,
};
use arcade_wire::{
    AppliedStepProto, SessionTranscript, StepKind, TRANSCRIPT_FORMAT_VERSION, TuningParameter,
    WireError,
};
use prost::Message;
use sha2::{Digest, Sha256};

// ============================================================================
// Applied Step
// ============================================================================

/// One transition the session actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedStep {
    Tick,
    Input(Action),
}

impl AppliedStep {
    fn to_proto(self, at_tick: Tick) -> AppliedStepProto {
        match self {
            Self::Tick => AppliedStepProto {
                kind: StepKind::Tick as i32,
                action: String::new(),
                at_tick,
            },
            Self::Input(action) => AppliedStepProto {
                kind: StepKind::Input as i32,
                action: action.as_str().to_string(),
                at_tick,
            },
        }
    }
}

impl TryFrom<&AppliedStepProto> for AppliedStep {
    type Error = VerifyError;

    fn try_from(proto: &AppliedStepProto) -> Result<Self, Self::Error> {
        match StepKind::try_from(proto.kind) {
            Ok(StepKind::Tick) => Ok(Self::Tick),
            Ok(StepKind::Input) => Action::parse(&proto.action)
                .map(Self::Input)
                .ok_or_else(|| VerifyError::InvalidFormat {
                    reason: format!("unknown action `{}`", proto.action),
                }),
            Err(_) => Err(VerifyError::InvalidFormat {
                reason: format!("unknown step kind {}", proto.kind),
            }),
        }
    }
}

// ============================================================================
// Session Recorder
// ============================================================================

/// Records one session for transcript generation.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    owner_id: OwnerId,
    params: VariantParams,
    seed: Option<u64>,
    initial_digest: u64,
    steps: Vec<AppliedStepProto>,
}

impl SessionRecorder {
    /// Start recording from a freshly built game.
    pub fn new(owner_id: OwnerId, initial: &GameState) -> Self {
        Self {
            owner_id,
            params: initial.params().clone(),
            seed: initial.seed(),
            initial_digest: initial.state_digest(),
            steps: Vec::new(),
        }
    }

    /// Record a step that was applied when `at_tick` ticks had elapsed.
    pub fn record(&mut self, step: AppliedStep, at_tick: Tick) {
        self.steps.push(step.to_proto(at_tick));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Finalize the transcript from the state the session ended in.
    pub fn finalize(self, last: &GameState, end_reason: &str) -> SessionTranscript {
        SessionTranscript {
            transcript_format_version: TRANSCRIPT_FORMAT_VERSION,
            owner_id: self.owner_id,
            variant: self.params.variant().as_str().to_string(),
            seed: self.seed,
            rng_algorithm: RNG_ALGORITHM.to_string(),
            state_digest_algo_id: STATE_DIGEST_ALGO_ID.to_string(),
            tuning_parameters: self
                .params
                .tuning_parameters()
                .into_iter()
                .map(|(key, value)| TuningParameter { key, value })
                .collect(),
            initial_digest: self.initial_digest,
            steps: self.steps,
            final_digest: last.state_digest(),
            elapsed_ticks: last.elapsed(),
            final_score: last.score(),
            end_reason: end_reason.to_string(),
        }
    }
}

// ============================================================================
// Transcript Verification
// ============================================================================

/// Transcript verification error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    /// Scripted spawn sources carry no seed and cannot be rebuilt.
    #[error("transcript has no seed; scripted sessions cannot be verified")]
    Unseeded,
    #[error("unsupported transcript: {reason}")]
    InvalidFormat { reason: String },
    #[error("transcript parameters rejected: {0}")]
    Parameters(#[from] SimError),
    #[error("initial digest mismatch: expected {expected:#x}, got {actual:#x}")]
    InitializationAnchorMismatch { expected: u64, actual: u64 },
    #[error("step {index} was rejected on replay: {source}")]
    StepRejected { index: usize, source: SimError },
    #[error("step {index} recorded at tick {recorded}, replayed at tick {actual}")]
    StepTickMismatch {
        index: usize,
        recorded: Tick,
        actual: Tick,
    },
    #[error("elapsed ticks mismatch: expected {expected}, got {actual}")]
    ElapsedMismatch { expected: Tick, actual: Tick },
    #[error("score mismatch: expected {expected}, got {actual}")]
    ScoreMismatch { expected: u32, actual: u32 },
    #[error("final digest mismatch: expected {expected:#x}, got {actual:#x}")]
    FinalDigestMismatch { expected: u64, actual: u64 },
}

impl From<WireError> for VerifyError {
    fn from(err: WireError) -> Self {
        Self::InvalidFormat {
            reason: err.to_string(),
        }
    }
}

/// Verify a transcript reproduces its recorded outcome.
///
/// # Verification Steps
/// 1. Check format version and algorithm identifiers
/// 2. Rebuild the parameters and a seeded spawner
/// 3. Compare the initial digest
/// 4. Replay every step in order
/// 5. Compare elapsed ticks, score and final digest
pub fn verify_transcript(transcript: &SessionTranscript) -> Result<(), VerifyError> {
    // Step 1: identifiers
    if transcript.transcript_format_version != TRANSCRIPT_FORMAT_VERSION {
        return Err(VerifyError::InvalidFormat {
            reason: format!(
                "format version {} (expected {TRANSCRIPT_FORMAT_VERSION})",
                transcript.transcript_format_version
            ),
        });
    }
    if transcript.state_digest_algo_id != STATE_DIGEST_ALGO_ID {
        return Err(VerifyError::InvalidFormat {
            reason: format!("digest algorithm `{}`", transcript.state_digest_algo_id),
        });
    }
    let seed = transcript.seed.ok_or(VerifyError::Unseeded)?;
    if transcript.rng_algorithm != RNG_ALGORITHM {
        return Err(VerifyError::InvalidFormat {
            reason: format!("rng algorithm `{}`", transcript.rng_algorithm),
        });
    }

    // Step 2: rebuild
    let variant = transcript.variant()?;
    let pairs: Vec<(String, f64)> = transcript
        .tuning_parameters
        .iter()
        .map(|p| (p.key.clone(), p.value))
        .collect();
    let params = VariantParams::from_tuning(variant, &pairs)?;
    let mut state = GameState::new(params, Spawner::seeded(seed))?;

    // Step 3: initialization anchor
    let initial = state.state_digest();
    if initial != transcript.initial_digest {
        return Err(VerifyError::InitializationAnchorMismatch {
            expected: transcript.initial_digest,
            actual: initial,
        });
    }

    // Step 4: replay
    for (index, proto) in transcript.steps.iter().enumerate() {
        if proto.at_tick != state.elapsed() {
            return Err(VerifyError::StepTickMismatch {
                index,
                recorded: proto.at_tick,
                actual: state.elapsed(),
            });
        }
        let result = match AppliedStep::try_from(proto)? {
            AppliedStep::Tick => state.tick(),
            AppliedStep::Input(action) => state.apply_input(action),
        };
        result.map_err(|source| VerifyError::StepRejected { index, source })?;
    }

    // Step 5: outcome
    if state.elapsed() != transcript.elapsed_ticks {
        return Err(VerifyError::ElapsedMismatch {
            expected: transcript.elapsed_ticks,
            actual: state.elapsed(),
        });
    }
    if state.score() != transcript.final_score {
        return Err(VerifyError::ScoreMismatch {
            expected: transcript.final_score,
            actual: state.score(),
        });
    }
    let actual = state.state_digest();
    if actual != transcript.final_digest {
        return Err(VerifyError::FinalDigestMismatch {
            expected: transcript.final_digest,
            actual,
        });
    }

    Ok(())
}

// ============================================================================
// Transcript I/O
// ============================================================================

/// Hex SHA-256 of the encoded transcript.
pub fn transcript_sha256(transcript: &SessionTranscript) -> String {
    format!("{:x}", Sha256::digest(transcript.encode_to_vec()))
}

/// File name for a transcript: `<owner>-<first 16 hex chars of sha256>.bin`.
pub fn transcript_path(dir: &Path, transcript: &SessionTranscript) -> PathBuf {
    let hash = transcript_sha256(transcript);
    dir.join(format!("{}-{}.bin", transcript.owner_id, &hash[..16]))
}

/// Write a transcript to a file. Existing files are never overwritten.
pub fn write_transcript(transcript: &SessionTranscript, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Transcript already exists at {}", path.display()),
                )
            } else {
                e
            }
        })?;
    file.write_all(&transcript.encode_to_vec())?;

    Ok(())
}

/// Read a transcript from a file.
pub fn read_transcript(path: &Path) -> io::Result<SessionTranscript> {
    let data = fs::read(path)?;
    SessionTranscript::decode(data.as_slice()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to decode transcript: {e}"),
        )
    })
}

// ============================================================================
// Tests
// ============================================================================
