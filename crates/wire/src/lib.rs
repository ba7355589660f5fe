//! Arcade Wire Types
//!
//! Protobuf message types exchanged between the session engine and the
//! presentation layer (the chat front end), plus the session transcript
//! format written by the replay crate.
//!
//! # Message Categories
//!
//! - **Outbound** (engine → presentation): board frames, session-ended notices
//! - **Inbound** (presentation → engine): action events tagged with an owner
//! - **Transcripts**: seed, tuning parameters and applied steps of one session

#![deny(unsafe_code)]

use arcade_sim::{Action, BoardFrame, OwnerId, TerminalReason, Variant};
use prost::Message;

/// Transcript schema version.
pub const TRANSCRIPT_FORMAT_VERSION: u32 = 1;

/// Conversion failure for inbound messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("unknown variant `{0}`")]
    UnknownVariant(String),
    #[error("unknown end reason `{0}`")]
    UnknownEndReason(String),
}

// ============================================================================
// Outbound Messages
// ============================================================================

/// One rendered frame for a session.
#[derive(Clone, PartialEq, Message)]
pub struct BoardFrameProto {
    #[prost(uint64, tag = "1")]
    pub owner_id: OwnerId,

    /// Variant name (`Variant::as_str`).
    #[prost(string, tag = "2")]
    pub variant: String,

    /// Fixed-width rows of cell symbols, top row first.
    #[prost(string, repeated, tag = "3")]
    pub rows: Vec<String>,

    /// Action names the presentation layer should offer as buttons.
    #[prost(string, repeated, tag = "4")]
    pub affordances: Vec<String>,

    #[prost(uint32, tag = "5")]
    pub score: u32,

    #[prost(uint32, tag = "6")]
    pub score_cap: u32,

    #[prost(uint64, tag = "7")]
    pub remaining_ticks: u64,

    /// StateDigest of the rendered state.
    #[prost(uint64, tag = "8")]
    pub digest: u64,
}

impl BoardFrameProto {
    pub fn from_frame(owner_id: OwnerId, frame: &BoardFrame) -> Self {
        Self {
            owner_id,
            variant: frame.variant.as_str().to_string(),
            rows: frame.rows.clone(),
            affordances: frame
                .affordances
                .iter()
                .map(|a| a.as_str().to_string())
                .collect(),
            score: frame.score,
            score_cap: frame.score_cap,
            remaining_ticks: frame.remaining_ticks,
            digest: frame.digest,
        }
    }
}

/// Final notice for a session: how it ended and what it paid.
#[derive(Clone, PartialEq, Message)]
pub struct SessionEndedProto {
    #[prost(uint64, tag = "1")]
    pub owner_id: OwnerId,

    #[prost(string, tag = "2")]
    pub variant: String,

    /// `TerminalReason::as_str`, or "aborted".
    #[prost(string, tag = "3")]
    pub end_reason: String,

    #[prost(uint32, tag = "4")]
    pub score: u32,

    /// Resource kind credited (empty when nothing was settled).
    #[prost(string, tag = "5")]
    pub reward_kind: String,

    #[prost(uint64, tag = "6")]
    pub reward_amount: u64,

    /// Whether the ledger accepted the credit.
    #[prost(bool, tag = "7")]
    pub credited: bool,
}

// ============================================================================
// Inbound Messages
// ============================================================================

/// Player input from the presentation layer.
#[derive(Clone, PartialEq, Message)]
pub struct ActionEventProto {
    #[prost(uint64, tag = "1")]
    pub owner_id: OwnerId,

    /// Action name (`Action::as_str`).
    #[prost(string, tag = "2")]
    pub action: String,
}

impl ActionEventProto {
    pub fn new(owner_id: OwnerId, action: Action) -> Self {
        Self {
            owner_id,
            action: action.as_str().to_string(),
        }
    }
}

impl TryFrom<ActionEventProto> for (OwnerId, Action) {
    type Error = WireError;

    fn try_from(event: ActionEventProto) -> Result<Self, Self::Error> {
        let action =
            Action::parse(&event.action).ok_or(WireError::UnknownAction(event.action))?;
        Ok((event.owner_id, action))
    }
}

// ============================================================================
// Transcript Types
// ============================================================================

/// Kind of an applied step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StepKind {
    Tick = 0,
    Input = 1,
}

/// One applied transition, in application order.
#[derive(Clone, PartialEq, Message)]
pub struct AppliedStepProto {
    #[prost(enumeration = "StepKind", tag = "1")]
    pub kind: i32,

    /// Action name for inputs; empty for ticks.
    #[prost(string, tag = "2")]
    pub action: String,

    /// Elapsed ticks when the step was applied.
    #[prost(uint64, tag = "3")]
    pub at_tick: u64,
}

/// Tuning parameter key-value pair.
#[derive(Clone, PartialEq, Message)]
pub struct TuningParameter {
    #[prost(string, tag = "1")]
    pub key: String,

    #[prost(double, tag = "2")]
    pub value: f64,
}

/// Complete record of one session.
#[derive(Clone, PartialEq, Message)]
pub struct SessionTranscript {
    #[prost(uint32, tag = "1")]
    pub transcript_format_version: u32,

    #[prost(uint64, tag = "2")]
    pub owner_id: OwnerId,

    #[prost(string, tag = "3")]
    pub variant: String,

    /// Spawn seed; absent for scripted sessions.
    #[prost(uint64, optional, tag = "4")]
    pub seed: Option<u64>,

    #[prost(string, tag = "5")]
    pub rng_algorithm: String,

    #[prost(string, tag = "6")]
    pub state_digest_algo_id: String,

    /// Tuning parameters (sorted by key).
    #[prost(message, repeated, tag = "7")]
    pub tuning_parameters: Vec<TuningParameter>,

    /// StateDigest of the initial state.
    #[prost(uint64, tag = "8")]
    pub initial_digest: u64,

    #[prost(message, repeated, tag = "9")]
    pub steps: Vec<AppliedStepProto>,

    /// StateDigest when the session was torn down.
    #[prost(uint64, tag = "10")]
    pub final_digest: u64,

    #[prost(uint64, tag = "11")]
    pub elapsed_ticks: u64,

    #[prost(uint32, tag = "12")]
    pub final_score: u32,

    /// `TerminalReason::as_str`, or "aborted".
    #[prost(string, tag = "13")]
    pub end_reason: String,
}

impl SessionTranscript {
    pub fn variant(&self) -> Result<Variant, WireError> {
        Variant::parse(&self.variant).ok_or_else(|| WireError::UnknownVariant(self.variant.clone()))
    }

    /// Terminal reason; `None` for aborted sessions.
    pub fn terminal_reason(&self) -> Result<Option<TerminalReason>, WireError> {
        if self.end_reason == ABORTED {
            return Ok(None);
        }
        TerminalReason::parse(&self.end_reason)
            .map(Some)
            .ok_or_else(|| WireError::UnknownEndReason(self.end_reason.clone()))
    }
}

/// End reason recorded for sessions torn down without a terminal condition.
pub const ABORTED: &str = "aborted";

// ============================================================================
// Tests
// ============================================================================
